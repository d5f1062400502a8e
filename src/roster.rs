use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
        }
    }
}

/// One enrolled student as the roster resolver sees it.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub student_id: String,
    pub roll_number: i64,
}

#[derive(Debug, Clone)]
pub struct PlannedMark {
    pub student_id: String,
    pub status: Status,
}

/// Expands an absentee roll set against a roster: one mark per enrolled
/// student, absent where the roll number is listed, present otherwise.
/// Roll numbers with no matching enrollment are ignored.
pub fn reconcile(roster: &[RosterEntry], absent_rolls: &HashSet<i64>) -> Vec<PlannedMark> {
    roster
        .iter()
        .map(|entry| PlannedMark {
            student_id: entry.student_id.clone(),
            status: if absent_rolls.contains(&entry.roll_number) {
                Status::Absent
            } else {
                Status::Present
            },
        })
        .collect()
}
