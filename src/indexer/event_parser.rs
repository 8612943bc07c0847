use ethers::{
    abi::{decode, ParamType, Token},
    types::{Address, Log, H256, U256},
    utils::keccak256,
};

use crate::models::GridCell;

pub const AREA_BOMBED_SIGNATURE: &str = "AreaBombed(address,uint256,uint256,uint256)";
pub const ROCKET_FIRED_SIGNATURE: &str = "RocketFired(address,uint256,uint256,uint256)";
pub const NFT_MINTED_SIGNATURE: &str = "NFTMinted(address,uint256,string)";

/// Contract events the canvas reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    AreaBombed {
        user: Address,
        center: GridCell,
        radius: u32,
    },
    RocketFired {
        user: Address,
        center: GridCell,
        radius: u32,
    },
    NftMinted {
        to: Address,
        token_id: U256,
        token_uri: String,
    },
}

impl ChainEvent {
    /// Actor of the event.
    pub fn account(&self) -> Address {
        match self {
            ChainEvent::AreaBombed { user, .. } | ChainEvent::RocketFired { user, .. } => *user,
            ChainEvent::NftMinted { to, .. } => *to,
        }
    }

    /// Center and radius for events that clear an area.
    pub fn area(&self) -> Option<(GridCell, u32)> {
        match self {
            ChainEvent::AreaBombed { center, radius, .. } | ChainEvent::RocketFired { center, radius, .. } => {
                Some((*center, *radius))
            }
            ChainEvent::NftMinted { .. } => None,
        }
    }
}

/// Decoded event plus where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub event: ChainEvent,
    pub block_number: Option<u64>,
    pub tx_hash: Option<H256>,
}

fn topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

fn address_from_topic(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

fn to_u32(value: &U256) -> Option<u32> {
    (*value <= U256::from(u32::MAX)).then(|| value.as_u32())
}

/// Event Parser - decodes pixel-war contract logs by topic0
#[derive(Debug, Clone)]
pub struct EventParser {
    area_bombed: H256,
    rocket_fired: H256,
    nft_minted: H256,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    pub fn new() -> Self {
        Self {
            area_bombed: topic(AREA_BOMBED_SIGNATURE),
            rocket_fired: topic(ROCKET_FIRED_SIGNATURE),
            nft_minted: topic(NFT_MINTED_SIGNATURE),
        }
    }

    pub fn parse_log(&self, log: &Log) -> Option<LoggedEvent> {
        let event = self.parse_event(log)?;
        Some(LoggedEvent {
            event,
            block_number: log.block_number.map(|n| n.as_u64()),
            tx_hash: log.transaction_hash,
        })
    }

    /// Returns `None` for unknown or malformed logs.
    pub fn parse_event(&self, log: &Log) -> Option<ChainEvent> {
        let key = log.topics.first()?;
        if *key == self.area_bombed || *key == self.rocket_fired {
            let user = address_from_topic(log.topics.get(1)?);
            let (center, radius) = self.parse_area(log)?;
            return Some(if *key == self.area_bombed {
                ChainEvent::AreaBombed { user, center, radius }
            } else {
                ChainEvent::RocketFired { user, center, radius }
            });
        }
        if *key == self.nft_minted {
            return self.parse_mint(log);
        }
        None
    }

    fn parse_area(&self, log: &Log) -> Option<(GridCell, u32)> {
        let tokens = decode(&[ParamType::Uint(256), ParamType::Uint(256), ParamType::Uint(256)], &log.data)
            .map_err(|e| tracing::warn!("Malformed area event data: {}", e))
            .ok()?;
        let words: Vec<U256> = tokens.into_iter().filter_map(Token::into_uint).collect();
        let [x, y, radius] = words.as_slice() else {
            return None;
        };
        let x = i32::try_from(to_u32(x)?).ok()?;
        let y = i32::try_from(to_u32(y)?).ok()?;
        Some((GridCell::new(x, y), to_u32(radius)?))
    }

    fn parse_mint(&self, log: &Log) -> Option<ChainEvent> {
        let to = address_from_topic(log.topics.get(1)?);
        let mut tokens = decode(&[ParamType::Uint(256), ParamType::String], &log.data)
            .map_err(|e| tracing::warn!("Malformed NFTMinted data: {}", e))
            .ok()?
            .into_iter();
        let token_id = tokens.next()?.into_uint()?;
        let token_uri = tokens.next()?.into_string()?;
        Some(ChainEvent::NftMinted { to, token_id, token_uri })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{area_log, mint_log};
    use super::*;

    #[test]
    fn decodes_area_bombed() {
        let user = Address::repeat_byte(0xab);
        let log = area_log(AREA_BOMBED_SIGNATURE, user, 205, 206, 3, 42);
        let parsed = EventParser::new().parse_log(&log).unwrap();
        assert_eq!(
            parsed.event,
            ChainEvent::AreaBombed { user, center: GridCell::new(205, 206), radius: 3 }
        );
        assert_eq!(parsed.block_number, Some(42));
        assert_eq!(parsed.event.area(), Some((GridCell::new(205, 206), 3)));
    }

    #[test]
    fn decodes_rocket_fired() {
        let user = Address::repeat_byte(0x01);
        let log = area_log(ROCKET_FIRED_SIGNATURE, user, 0, 499, 3, 1);
        let event = EventParser::new().parse_event(&log).unwrap();
        assert!(matches!(event, ChainEvent::RocketFired { radius: 3, .. }));
        assert_eq!(event.account(), user);
    }

    #[test]
    fn decodes_nft_minted() {
        let to = Address::repeat_byte(0x22);
        let event = EventParser::new()
            .parse_event(&mint_log(to, 7, "ipfs://QmMeta", 9))
            .unwrap();
        assert_eq!(
            event,
            ChainEvent::NftMinted { to, token_id: U256::from(7), token_uri: "ipfs://QmMeta".into() }
        );
        assert_eq!(event.area(), None);
    }

    #[test]
    fn ignores_unknown_and_truncated_logs() {
        let parser = EventParser::new();
        let mut unknown = area_log("Transfer(address,address,uint256)", Address::zero(), 1, 1, 1, 1);
        assert!(parser.parse_event(&unknown).is_none());

        unknown = area_log(AREA_BOMBED_SIGNATURE, Address::zero(), 1, 1, 1, 1);
        unknown.data = vec![0u8; 31].into();
        assert!(parser.parse_event(&unknown).is_none());

        assert!(parser.parse_event(&Log::default()).is_none());
    }

    #[test]
    fn oversized_coordinates_are_rejected() {
        let log = area_log(AREA_BOMBED_SIGNATURE, Address::zero(), u64::MAX, 1, 3, 1);
        assert!(EventParser::new().parse_event(&log).is_none());
    }
}
