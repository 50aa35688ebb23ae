//! Keyword-matched suggestion catalogs.
//!
//! The goal store only consumes the strings these produce; any other source
//! (a remote model, a curated database) can stand in behind [`SuggestionProvider`].

use regex::Regex;
use serde::Serialize;

use crate::types::{Action, Obstacle, Priority, Step, Target};

pub trait SuggestionProvider: Send + Sync {
    fn suggest(&self, text: &str) -> Vec<String>;
}

/// First matching rule wins; the fallback list covers everything else.
pub struct KeywordCatalog<T> {
    rules: Vec<(Regex, Vec<T>)>,
    fallback: Vec<T>,
}

impl<T: Clone> KeywordCatalog<T> {
    pub fn new(rules: Vec<(&str, Vec<T>)>, fallback: Vec<T>) -> Result<Self, regex::Error> {
        let rules = rules
            .into_iter()
            .map(|(pattern, items)| Ok((Regex::new(pattern)?, items)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules, fallback })
    }

    pub fn lookup(&self, text: &str) -> Vec<T> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(&text))
            .map(|(_, items)| items.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl SuggestionProvider for KeywordCatalog<String> {
    fn suggest(&self, text: &str) -> Vec<String> {
        self.lookup(text)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionSuggestion {
    pub title: String,
    pub urgency: Priority,
    pub impact: Priority,
}

impl SuggestionProvider for KeywordCatalog<ActionSuggestion> {
    fn suggest(&self, text: &str) -> Vec<String> {
        self.lookup(text).into_iter().map(|s| s.title).collect()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn action(title: &str, urgency: Priority, impact: Priority) -> ActionSuggestion {
    ActionSuggestion {
        title: title.to_string(),
        urgency,
        impact,
    }
}

/// One provider per place suggestions are offered.
///
/// Action suggestions carry priorities, so that catalog stays concrete; the
/// plain-text providers can be replaced with the `with_*` builders.
pub struct Suggestions {
    pub actions: KeywordCatalog<ActionSuggestion>,
    pub steps: Box<dyn SuggestionProvider>,
    pub tasks: Box<dyn SuggestionProvider>,
    pub resolutions: Box<dyn SuggestionProvider>,
}

impl Suggestions {
    pub fn builtin() -> Result<Self, regex::Error> {
        use Priority::{High, Medium};

        let actions = KeywordCatalog::new(
            vec![
                (
                    r"fitness|health|workout|exercise|weight|gym",
                    vec![
                        action("Create a weekly workout schedule", High, High),
                        action("Set up meal planning system", High, High),
                        action("Buy necessary workout equipment", Medium, High),
                        action("Find a workout buddy or trainer", Medium, Medium),
                        action("Track daily calorie intake", High, High),
                    ],
                ),
                (
                    r"business|startup|company|profit|market",
                    vec![
                        action("Conduct market research", High, High),
                        action("Create business plan", High, High),
                        action("Set up legal structure", High, High),
                        action("Develop marketing strategy", Medium, High),
                        action("Secure initial funding", High, High),
                    ],
                ),
                (
                    r"study|learn|education|course|degree|exam",
                    vec![
                        action("Create study schedule", High, High),
                        action("Gather learning materials", High, Medium),
                        action("Find study group or mentor", Medium, High),
                        action("Set up practice tests", Medium, High),
                        action("Create progress tracking system", Medium, Medium),
                    ],
                ),
            ],
            vec![
                action("Break down target into smaller milestones", High, High),
                action("Create timeline and deadlines", High, High),
                action("Identify potential obstacles", Medium, High),
                action("Set up progress tracking method", Medium, Medium),
                action("Gather necessary resources", High, Medium),
            ],
        )?;

        let steps = KeywordCatalog::new(
            vec![
                (
                    r"plan|strategy|organize|prepare",
                    strings(&[
                        "Create a detailed project timeline",
                        "Define key milestones and deliverables",
                        "Identify required resources and dependencies",
                        "Set up progress tracking metrics",
                        "Establish communication channels",
                    ]),
                ),
                (
                    r"build|create|implement|develop|code",
                    strings(&[
                        "Set up development environment",
                        "Create basic project structure",
                        "Implement core functionality",
                        "Add error handling and validation",
                        "Perform initial testing",
                    ]),
                ),
                (
                    r"research|analyze|study|investigate",
                    strings(&[
                        "Conduct market analysis",
                        "Review existing solutions",
                        "Identify target audience",
                        "Analyze competitors",
                        "Document findings and insights",
                    ]),
                ),
            ],
            strings(&[
                "Break down the action into smaller tasks",
                "Create a checklist of requirements",
                "Set up monitoring and tracking",
                "Review and validate progress",
                "Document process and learnings",
            ]),
        )?;

        let tasks = KeywordCatalog::new(
            vec![
                (
                    r"research|study|analyze|investigate",
                    strings(&[
                        "Break down the research into specific topics",
                        "Identify key sources and references",
                        "Create a research timeline",
                        "Document findings systematically",
                        "Review and validate findings",
                    ]),
                ),
                (
                    r"plan|prepare|design|strategy",
                    strings(&[
                        "Define clear objectives and goals",
                        "Create a detailed timeline",
                        "Identify required resources",
                        "Assign responsibilities",
                        "Set up progress tracking methods",
                    ]),
                ),
                (
                    r"implement|execute|build|create|develop",
                    strings(&[
                        "Create a step-by-step implementation plan",
                        "Set up monitoring and feedback mechanisms",
                        "Prepare contingency plans",
                        "Document the implementation process",
                        "Regular progress reviews",
                    ]),
                ),
            ],
            strings(&[
                "Break down the step into smaller tasks",
                "Set specific deadlines for each task",
                "Identify potential challenges",
                "Create a progress tracking system",
                "Regular review and adjustment",
            ]),
        )?;

        let resolutions = KeywordCatalog::new(
            vec![
                (
                    r"technical|system|software|hardware|code|bug",
                    strings(&[
                        "Research and implement alternative technical solutions",
                        "Consult with technical experts or documentation",
                        "Break down the problem into smaller, manageable parts",
                        "Create a proof of concept to validate the solution",
                        "Set up proper testing environment",
                    ]),
                ),
                (
                    r"resource|budget|cost|funding|staff|equipment",
                    strings(&[
                        "Identify alternative resources or suppliers",
                        "Optimize existing resource allocation",
                        "Create a resource sharing plan",
                        "Develop contingency plans for resource constraints",
                        "Negotiate for additional resources",
                    ]),
                ),
                (
                    r"time|schedule|deadline|delay|late",
                    strings(&[
                        "Reassess and adjust project timeline",
                        "Identify tasks that can be parallelized",
                        "Optimize critical path activities",
                        "Add additional resources to critical tasks",
                        "Negotiate deadline extensions if necessary",
                    ]),
                ),
            ],
            strings(&[
                "Break down the obstacle into smaller challenges",
                "Create a detailed action plan",
                "Identify and engage key stakeholders",
                "Set up regular progress reviews",
                "Document lessons learned for future reference",
            ]),
        )?;

        Ok(Self {
            actions,
            steps: Box::new(steps),
            tasks: Box::new(tasks),
            resolutions: Box::new(resolutions),
        })
    }

    pub fn with_steps(mut self, provider: impl SuggestionProvider + 'static) -> Self {
        self.steps = Box::new(provider);
        self
    }

    pub fn with_tasks(mut self, provider: impl SuggestionProvider + 'static) -> Self {
        self.tasks = Box::new(provider);
        self
    }

    pub fn with_resolutions(mut self, provider: impl SuggestionProvider + 'static) -> Self {
        self.resolutions = Box::new(provider);
        self
    }

    pub fn for_target(&self, target: &Target) -> Vec<ActionSuggestion> {
        self.actions
            .lookup(&format!("{} {}", target.title, target.description))
    }

    pub fn for_action(&self, target: &Target, action: &Action) -> Vec<String> {
        self.steps.suggest(&format!(
            "{} {} {}",
            target.title, target.description, action.title
        ))
    }

    pub fn for_step(&self, step: &Step) -> Vec<String> {
        self.tasks.suggest(&step.description)
    }

    pub fn for_obstacle(&self, obstacle: &Obstacle) -> Vec<String> {
        self.resolutions.suggest(&obstacle.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> Suggestions {
        Suggestions::builtin().expect("builtin patterns compile")
    }

    #[test]
    fn target_keywords_pick_action_catalog() {
        let s = builtin();
        let target = Target::new("u", "Lose weight", "Go to the gym", "health", "fitness");
        let suggestions = s.for_target(&target);
        assert_eq!(suggestions.len(), 5);
        assert_eq!(suggestions[0].title, "Create a weekly workout schedule");
        assert_eq!(suggestions[2].urgency, Priority::Medium);

        let target = Target::new("u", "Paint the shed", "", "home", "diy");
        assert_eq!(
            s.for_target(&target)[0].title,
            "Break down target into smaller milestones"
        );
    }

    #[test]
    fn step_suggestions_use_target_and_action_text() {
        let s = builtin();
        let target = Target::new("u", "Launch an app", "", "career", "software");
        let action = Action::new("Build the MVP", Priority::High, Priority::High);
        assert_eq!(
            s.for_action(&target, &action)[0],
            "Set up development environment"
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let s = builtin();
        // Matches both "research" and "plan"; research is listed first for tasks.
        let step = Step::new("Research and plan the route");
        assert_eq!(
            s.for_step(&step)[0],
            "Break down the research into specific topics"
        );
    }

    #[test]
    fn obstacle_resolutions_match_case_insensitively() {
        let s = builtin();
        assert_eq!(
            s.for_obstacle(&Obstacle::new("BUDGET is too small"))[0],
            "Identify alternative resources or suppliers"
        );
        assert_eq!(
            s.for_obstacle(&Obstacle::new("Motivation dips"))[0],
            "Break down the obstacle into smaller challenges"
        );
    }

    #[test]
    fn provider_trait_is_object_safe() {
        let s = builtin();
        assert_eq!(s.resolutions.suggest("software bug").len(), 5);
        let titles: &dyn SuggestionProvider = &s.actions;
        assert!(titles.suggest("startup").contains(&"Create business plan".to_string()));
    }

    struct Fixed(&'static str);

    impl SuggestionProvider for Fixed {
        fn suggest(&self, text: &str) -> Vec<String> {
            vec![format!("{}: {text}", self.0)]
        }
    }

    #[test]
    fn providers_can_be_swapped() {
        let s = builtin().with_resolutions(Fixed("ask")).with_tasks(Fixed("do"));
        assert_eq!(
            s.for_obstacle(&Obstacle::new("budget")),
            vec!["ask: budget".to_string()]
        );
        assert_eq!(s.for_step(&Step::new("plan")), vec!["do: plan".to_string()]);
        assert_eq!(
            s.for_action(
                &Target::new("u", "Launch", "", "c", "s"),
                &Action::new("Build", Priority::High, Priority::High)
            )[0],
            "Set up development environment"
        );
    }
}
