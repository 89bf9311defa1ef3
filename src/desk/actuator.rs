use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorKind {
    Single { desk_id: String },
    /// Desks that move together. Position is read back from the first member.
    Group { group_id: String, members: Vec<String> },
}

/// One movable unit, either a single desk or a group of desks.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Actuator {
    pub id: String,
    pub name: String,
    pub kind: ActuatorKind,
}

/// Where a height command for an actuator is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeightTarget<'a> {
    Desk(&'a str),
    Group(&'a str),
}

impl HeightTarget<'_> {
    pub fn path(&self) -> String {
        match self {
            HeightTarget::Desk(id) => format!("/desks/{id}/height"),
            HeightTarget::Group(id) => format!("/groups/{id}/height"),
        }
    }
}

impl Actuator {
    pub fn single(desk_id: impl Into<String>, name: impl Into<String>) -> Self {
        let desk_id = desk_id.into();

        Actuator {
            id: desk_id.clone(),
            name: name.into(),
            kind: ActuatorKind::Single { desk_id },
        }
    }

    pub fn group(group_id: impl Into<String>, members: Vec<String>) -> Self {
        let group_id = group_id.into();

        Actuator {
            id: group_id.clone(),
            name: group_id.clone(),
            kind: ActuatorKind::Group { group_id, members },
        }
    }

    pub fn height_target(&self) -> HeightTarget<'_> {
        match &self.kind {
            ActuatorKind::Single { desk_id } => HeightTarget::Desk(desk_id),
            ActuatorKind::Group { group_id, .. } => HeightTarget::Group(group_id),
        }
    }

    /// Desk whose height stands in for the whole actuator. `None` for a
    /// group without members.
    pub fn readback_desk(&self) -> Option<&str> {
        match &self.kind {
            ActuatorKind::Single { desk_id } => Some(desk_id),
            ActuatorKind::Group { members, .. } => members.first().map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_desk_addresses_itself() {
        let desk = Actuator::single("aa:bb", "Left desk");

        assert_eq!(desk.height_target().path(), "/desks/aa:bb/height");
        assert_eq!(desk.readback_desk(), Some("aa:bb"));
    }

    #[test]
    fn group_reads_back_first_member() {
        let group = Actuator::group("office", vec!["d1".into(), "d2".into()]);

        assert_eq!(group.height_target().path(), "/groups/office/height");
        assert_eq!(group.readback_desk(), Some("d1"));
        assert_eq!(group.name, "office");
    }

    #[test]
    fn empty_group_has_no_readback() {
        let group = Actuator::group("empty", vec![]);

        assert_eq!(group.readback_desk(), None);
    }
}
