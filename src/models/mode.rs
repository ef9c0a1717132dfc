use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::LadderError;

/// The four supported match formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum Mode {
    Land = 1,
    Conquest = 2,
    Domination = 3,
    LuckyDice = 4,
}

const DEFAULT_K_FACTOR: f64 = 32.0;
const LOW_VOLATILITY_K_FACTOR: f64 = 16.0;

const LAND_MAPS: &[&str] = &[
    "Bjornling's Gathering",
    "Castle Drakenhof",
    "Dok Karaz",
    "Eschen",
    "Galbaraz",
    "Gor Gazan",
    "Karag Dron",
    "Karak Azgal",
    "Karak Bhufdar",
    "Karak Ungor",
    "L'Anguille",
    "Norden",
    "Oakenhammer",
    "Praag",
    "Schwartzhafen",
    "Volksgrad",
    "Waldenhof",
    "Alpine Ridge",
    "Crossroads",
    "Heorot Ridge",
    "Peak Pass",
    "Blue Reach River",
];

const CONQUEST_MAPS: &[&str] = &[
    "Isle of the Crimson Skull",
    "Tower of Hoeth",
    "Altdorf Outskirts",
    "Sword of Torgald",
    "Cliff of Beasts",
    "Glacier Lake",
    "Pillar Of Bone",
    "Southern Chaos Wastes",
    "Wyvern Lake",
    "The Lost Crater",
    "Valley of Thieves",
    "Mortis Wastes",
    "Ash Plains",
    "The Bitter Dunes",
    "Toothgrass Hill",
    "River Amaxon",
    "Shimmersward",
    "Horned Hills",
    "Blasted Lands",
    "Peasants Pasture",
    "Grey Mountain Stables",
    "Knights' Run",
    "The Tourney Grounds",
    "Choking Pits",
    "The Flats of Kislev",
    "Troll Run",
    "Black Ark",
    "Peak Pass",
    "Forest of Shadows",
    "The Dead Wood",
    "Gor Gazan",
    "Schwartzhafen",
    "Alpine Ridge",
    "Crossroads",
    "Dok Karaz",
    "Eschen",
    "Heorot Ridge",
    "Galbaraz",
    "Blue Reach River",
    "Praag",
];

const DOMINATION_MAPS: &[&str] = &[
    "Altar Of the Champion",
    "Arachnarok Lair",
    "Bleakspire Labor Camp",
    "CA Bordeleaux landing",
    "CA Celestial Lake",
    "Chateau de Roquefort",
    "Dusted Steppe",
    "CA Gates of Ekrund",
    "CA Glade of Everqueen",
    "Glinty Toof's Crag",
    "Imperial Road",
    "CA Road to Talabheim",
    "CA Mountains of Mourn",
    "CA Black Ark",
    "CA Battle for Itza",
    "CA Galleon's Cove",
    "CA Death Pass",
    "CA Crossing the Sea of Claws",
    "Arbiter Grounds",
    "Coedil Mistwood",
    "Creeping Swamp",
    "Cristal Lake",
    "Decrepit Moor",
    "Dried Floodplain",
    "Eastern Isle Colony",
    "Edge of Darkwood",
    "Excavation Site",
    "Geyser bluff",
    "Halls of Karag Dum",
];

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Land, Mode::Conquest, Mode::Domination, Mode::LuckyDice];

    /// Stable integer key used in storage
    pub fn key(self) -> i16 {
        self as i16
    }

    pub fn from_key(key: i16) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.key() == key)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Land => "land",
            Mode::Conquest => "conquest",
            Mode::Domination => "domination",
            Mode::LuckyDice => "luckydice",
        }
    }

    /// Elo K-factor. Lucky dice results carry more chance, so they move ratings less.
    pub fn k_factor(self) -> f64 {
        match self {
            Mode::LuckyDice => LOW_VOLATILITY_K_FACTOR,
            _ => DEFAULT_K_FACTOR,
        }
    }

    /// Maps a match of this mode may be played on. Lucky dice is played as conquest.
    pub fn map_pool(self) -> &'static [&'static str] {
        match self {
            Mode::Land => LAND_MAPS,
            Mode::Conquest | Mode::LuckyDice => CONQUEST_MAPS,
            Mode::Domination => DOMINATION_MAPS,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Mode {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "land" | "l" => Ok(Mode::Land),
            "conquest" | "c" => Ok(Mode::Conquest),
            "domination" | "d" => Ok(Mode::Domination),
            "luckydice" | "ld" => Ok(Mode::LuckyDice),
            other => Err(LadderError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("l".parse::<Mode>().unwrap(), Mode::Land);
        assert_eq!("Conquest".parse::<Mode>().unwrap(), Mode::Conquest);
        assert_eq!(" d ".parse::<Mode>().unwrap(), Mode::Domination);
        assert_eq!("ld".parse::<Mode>().unwrap(), Mode::LuckyDice);
        assert!(matches!(
            "chess".parse::<Mode>(),
            Err(LadderError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_keys_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_key(mode.key()), Some(mode));
        }
        assert_eq!(Mode::from_key(9), None);
    }

    #[test]
    fn test_k_factors() {
        assert_eq!(Mode::Land.k_factor(), 32.0);
        assert_eq!(Mode::LuckyDice.k_factor(), 16.0);
    }

    #[test]
    fn test_every_mode_has_maps() {
        for mode in Mode::ALL {
            assert!(!mode.map_pool().is_empty());
        }
    }
}
