//! Prefab table used when decoding spawns
//!
//! Prefabs are numbered positionally by the game client; the order of
//! [`PREFABS`] is part of the wire format.

use crate::net_objects::NetObjectKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown prefab id {0}")]
pub struct UnknownPrefab(pub u32);

/// Components spawned together by one prefab, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefab {
    pub name: &'static str,
    pub components: &'static [NetObjectKind],
}

const SHIP: &[NetObjectKind] = &[NetObjectKind::ShipStatus];

pub const PREFABS: &[Prefab] = &[
    Prefab {
        name: "ShipStatus",
        components: SHIP,
    },
    Prefab {
        name: "MeetingHud",
        components: &[NetObjectKind::MeetingHud],
    },
    Prefab {
        name: "LobbyBehaviour",
        components: &[NetObjectKind::LobbyBehaviour],
    },
    Prefab {
        name: "GameData",
        components: &[NetObjectKind::GameData, NetObjectKind::VoteBanSystem],
    },
    Prefab {
        name: "PlayerControl",
        components: &[
            NetObjectKind::PlayerControl,
            NetObjectKind::PlayerPhysics,
            NetObjectKind::CustomNetworkTransform,
        ],
    },
    Prefab {
        name: "HeadQuarters",
        components: SHIP,
    },
    Prefab {
        name: "PlanetMap",
        components: SHIP,
    },
    Prefab {
        name: "AprilShipStatus",
        components: SHIP,
    },
];

pub const GAME_DATA_PREFAB_ID: u32 = 3;
pub const PLAYER_PREFAB_ID: u32 = 4;

pub fn lookup(prefab_id: u32) -> Result<&'static Prefab, UnknownPrefab> {
    PREFABS
        .get(prefab_id as usize)
        .ok_or(UnknownPrefab(prefab_id))
}
