#[cfg(test)]
mod tests {
    use vaultdexing::events::decoder;
    use vaultdexing::felts;
    use vaultdexing::{Felt, VaultEventKind};

    #[test]
    fn equates_differently_formatted_addresses() {
        let padded = "0x0127021A1B5A52E3F1A7FB852BB5B5E4826C8B4D4E19AC6C1CD0E3BFA9D74F89";
        let bare = "0x127021a1b5a52e3f1a7fb852bb5b5e4826c8b4d4e19ac6c1cd0e3bfa9d74f89";

        assert_eq!(
            felts::normalize(padded).unwrap(),
            felts::normalize(bare).unwrap()
        );
    }

    #[test]
    fn hex_text_round_trips() {
        let felt = Felt::from(0xdeadbeefu64);
        let text = felts::to_hex(&felt);

        assert_eq!(text, "0xdeadbeef");
        assert_eq!(felts::from_hex(&text).unwrap(), felt);
    }

    #[test]
    fn rejects_non_hex_text() {
        assert!(felts::from_hex("not hex").is_err());
        assert!(felts::from_hex("0x").is_err());
        assert!(felts::from_hex("").is_err());
    }

    #[test]
    fn selectors_fit_the_field() {
        for kind in VaultEventKind::ALL {
            assert!((kind.selector() >> 250).is_zero(), "{} overflows", kind.name());
        }
    }

    #[test]
    fn decodes_every_supported_kind() {
        for kind in VaultEventKind::ALL {
            assert_eq!(decoder::decode(&kind.selector()), Some(kind));
        }
    }

    #[test]
    fn unknown_selectors_are_unrecognized() {
        assert_eq!(decoder::decode(&felts::event_selector("Transfer")), None);
        assert_eq!(decoder::decode(&Felt::from(1u64)), None);
    }
}
