use serde::Serialize;

use crate::types::{Action, Priority};

/// Single priority for an action: the higher of urgency and impact.
pub fn tier(action: &Action) -> Priority {
    action.urgency.max(action.impact)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Heat {
    Critical,
    Elevated,
    Moderate,
    Minor,
    Standard,
}

impl Heat {
    pub fn of(urgency: Priority, impact: Priority) -> Self {
        use Priority::{High, Low, Medium};
        match (urgency, impact) {
            (High, High) => Heat::Critical,
            (High, _) | (_, High) => Heat::Elevated,
            (Medium, Medium) => Heat::Moderate,
            (Low, Low) => Heat::Minor,
            _ => Heat::Standard,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCell {
    pub urgency: Priority,
    pub impact: Priority,
    pub heat: Heat,
    pub action_ids: Vec<String>,
}

/// Urgency × impact grid, rows and columns ordered high → low.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriorityMatrix {
    pub cells: Vec<MatrixCell>,
}

fn slot(priority: Priority) -> usize {
    match priority {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    }
}

impl PriorityMatrix {
    pub fn build(actions: &[Action]) -> Self {
        let mut cells: Vec<MatrixCell> = Priority::DESCENDING
            .iter()
            .flat_map(|&urgency| {
                Priority::DESCENDING.iter().map(move |&impact| MatrixCell {
                    urgency,
                    impact,
                    heat: Heat::of(urgency, impact),
                    action_ids: Vec::new(),
                })
            })
            .collect();
        for action in actions {
            cells[slot(action.urgency) * 3 + slot(action.impact)]
                .action_ids
                .push(action.id.clone());
        }
        Self { cells }
    }

    pub fn cell(&self, urgency: Priority, impact: Priority) -> &[String] {
        &self.cells[slot(urgency) * 3 + slot(impact)].action_ids
    }

    pub fn occupied(&self) -> impl Iterator<Item = &MatrixCell> {
        self.cells.iter().filter(|c| !c.action_ids.is_empty())
    }
}
