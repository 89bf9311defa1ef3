use color_eyre::Result;
use log::{debug, info, warn};

use super::{
    actuator::Actuator,
    rest::{DeskData, DeskServerClient},
};
use crate::{controller::range::TravelRange, settings::Settings};

/// An actuator together with the height its readback desk last reported.
#[derive(Clone, Debug)]
pub struct DiscoveredActuator {
    pub actuator: Actuator,
    pub height: Option<f64>,
}

impl DiscoveredActuator {
    pub fn initial_position(&self, range: &TravelRange) -> u8 {
        self.height
            .map(|height| range.height_to_percentage(height))
            .unwrap_or(0)
    }
}

/// Turns the desk server's group listing into actuators. Groups without
/// members can't be positioned and are skipped.
pub fn groups_to_actuators(
    groups: impl IntoIterator<Item = (String, Vec<DeskData>)>,
) -> Vec<DiscoveredActuator> {
    let mut result = vec![];

    for (group_id, desks) in groups {
        if desks.is_empty() {
            warn!("Skipping desk group {group_id} without any desks");
            continue;
        }

        let height = desks.first().and_then(|desk| desk.height);
        let members = desks.into_iter().map(|desk| desk.id).collect();

        result.push(DiscoveredActuator {
            actuator: Actuator::group(group_id, members),
            height,
        });
    }

    result
}

pub fn desks_to_actuators(desks: Vec<DeskData>) -> Vec<DiscoveredActuator> {
    desks
        .into_iter()
        .map(|desk| DiscoveredActuator {
            height: desk.height,
            actuator: Actuator::single(desk.id, desk.config_name),
        })
        .collect()
}

pub async fn discover_actuators(
    settings: &Settings,
    client: &DeskServerClient,
) -> Result<Vec<DiscoveredActuator>> {
    let groups = client.get_groups().await?;

    // Query the server for each member of each group
    let mut resolved = vec![];
    for (group_id, desk_ids) in groups {
        let mut desks = vec![];
        for desk_id in &desk_ids {
            let desk = client.get_desk(desk_id).await?;
            debug!("Group {group_id} member: {desk:?}");
            desks.push(desk);
        }
        resolved.push((group_id, desks));
    }

    let mut actuators = groups_to_actuators(resolved);

    if settings.discovery.include_individual_desks {
        let desks = client.get_desks().await?;
        actuators.extend(desks_to_actuators(desks));
    }

    for discovered in &actuators {
        info!(
            "Discovered {} ({})",
            discovered.actuator.name, discovered.actuator.id
        );
    }

    Ok(actuators)
}
