//! Integration tests: exercise the full flow using a simulated controller.
//!
//! These tests attach a mock RGB controller to a mock bus, keep the saved
//! configuration in memory, and run the complete
//! resolve→frame→locate→send→persist pipeline through `set_color`.

#[cfg(test)]
mod tests {
    use crate::comm::Delivery;
    use crate::config::{to_json, ConfigStore, MemoryStore, StoredConfig};
    use crate::controller::{set_color, set_color_reporting, SetOutcome, SetRequest, Stage};
    use crate::error::Error;
    use crate::ident::{DeviceIdentity, HexOrInt};
    use crate::payload::{decode_hex, DEFAULT_PACKET_FOOTER, DEFAULT_PACKET_HEADER};
    use crate::transport::mock::{MockBus, WriteOutcome};

    const VID: u16 = 0x0416;
    const PID: u16 = 0x7399;

    /// Create a bus with a hub and the target controller attached.
    fn create_mock_bus() -> MockBus {
        let bus = MockBus::new();
        bus.attach(0x1d6b, 0x0003, Some("xHCI Host Controller"))
            .attach(VID, PID, Some("LCD Controller"));
        bus
    }

    fn expected_packet(color: &str) -> Vec<u8> {
        decode_hex(&format!("{DEFAULT_PACKET_HEADER}{color}{DEFAULT_PACKET_FOOTER}")).unwrap()
    }

    fn saved_default_config() -> MemoryStore {
        let saved = StoredConfig {
            vid: Some(HexOrInt::Int(VID.into())),
            pid: Some(HexOrInt::Int(PID.into())),
            ..StoredConfig::default()
        };
        MemoryStore::with_contents(to_json(&saved).unwrap())
    }

    /// Test: first run with explicit ids writes once and saves them.
    #[test]
    fn first_run_with_ids_writes_and_saves() {
        let bus = create_mock_bus();
        let store = MemoryStore::new();

        let request = SetRequest::new("FF0000").with_ids("0416", "7399");
        let outcome = set_color(&bus, &store, &request);

        match &outcome {
            SetOutcome::Applied {
                config,
                delivery,
                save_error,
            } => {
                assert_eq!(config.identity, DeviceIdentity::new(VID, PID));
                assert_eq!(*delivery, Delivery::FirstAttempt);
                assert!(save_error.is_none());
            }
            other => panic!("expected success, got {other:?}"),
        }

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].endpoint, 2);
        assert_eq!(writes[0].data, expected_packet("ff0000"));

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.vid, Some(HexOrInt::Int(0x0416)));
        assert_eq!(saved.pid, Some(HexOrInt::Int(0x7399)));
        assert_eq!(saved.endpoint, 2);
    }

    /// Test: a later run without ids uses the saved ones.
    #[test]
    fn saved_config_supplies_ids() {
        let bus = create_mock_bus();
        let store = saved_default_config();

        let outcome = set_color(&bus, &store, &SetRequest::new("00FF00"));
        assert!(outcome.is_success());

        let claimed = bus.claimed();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].identity(), DeviceIdentity::new(VID, PID));

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(&writes[0].data[9..12], &[0x00, 0xFF, 0x00]);
        assert_eq!(writes[0].data, expected_packet("00ff00"));
    }

    /// Test: transport error, reconnect, second write lands.
    #[test]
    fn transport_error_recovers_after_reconnect() {
        let bus = create_mock_bus();
        bus.on_claim(&[WriteOutcome::Fail]).on_claim(&[WriteOutcome::Ok]);
        let store = MemoryStore::new();

        let outcome = set_color(&bus, &store, &SetRequest::new("#0000ff").with_ids("0416", "7399"));
        assert!(matches!(
            outcome,
            SetOutcome::Applied {
                delivery: Delivery::AfterReconnect,
                ..
            }
        ));
        assert_eq!(bus.claim_count(), 2);
        assert_eq!(bus.writes().len(), 2);
        assert!(store.load().unwrap().is_some());
    }

    /// Test: transport error, device gone on reconnect, nothing saved.
    #[test]
    fn unplug_during_send_fails_without_saving() {
        let bus = create_mock_bus();
        bus.on_claim(&[WriteOutcome::Unplug]);
        let store = MemoryStore::new();

        let outcome = set_color(&bus, &store, &SetRequest::new("ff0000").with_ids("0416", "7399"));
        assert!(matches!(
            outcome,
            SetOutcome::Failed {
                stage: Stage::Send,
                error: Error::DeviceNotFound { .. }
            }
        ));
        assert!(!outcome.is_success());
        assert_eq!(bus.writes().len(), 1);
        assert_eq!(store.contents(), None);
    }

    /// Test: a failed send leaves an existing saved config untouched.
    #[test]
    fn failed_send_keeps_previous_config() {
        let bus = create_mock_bus();
        bus.on_claim(&[WriteOutcome::Fail]).on_claim(&[WriteOutcome::Fail]);
        let store = saved_default_config();
        let before = store.contents();

        let outcome = set_color(&bus, &store, &SetRequest::new("123456"));
        assert!(matches!(
            outcome,
            SetOutcome::Failed {
                stage: Stage::Send,
                error: Error::Transport(_)
            }
        ));
        assert_eq!(store.contents(), before);
    }

    /// Test: corrupt saved config is ignored, explicit ids still work.
    #[test]
    fn corrupt_config_is_treated_as_absent() {
        let bus = create_mock_bus();
        let store = MemoryStore::with_contents("{\"vid\": ");

        let outcome = set_color(&bus, &store, &SetRequest::new("ffffff").with_ids("0x0416", "0x7399"));
        assert!(outcome.is_success());
        assert_eq!(bus.writes()[0].data, expected_packet("ffffff"));

        // Overwritten with a valid record.
        assert!(store.load().unwrap().is_some());
    }

    /// Test: corrupt saved config and no ids is a missing-identity failure.
    #[test]
    fn corrupt_config_without_ids_is_missing_identity() {
        let bus = create_mock_bus();
        let store = MemoryStore::with_contents("garbage");

        let outcome = set_color(&bus, &store, &SetRequest::new("ffffff"));
        assert!(matches!(
            outcome,
            SetOutcome::Failed {
                stage: Stage::Resolve,
                error: Error::MissingIdentity
            }
        ));
        assert_eq!(bus.claim_count(), 0);
        assert_eq!(store.contents().as_deref(), Some("garbage"));
    }

    /// Test: the user is told why their saved ids were not used.
    #[test]
    fn corrupt_config_is_reported_alongside_failure() {
        let bus = create_mock_bus();
        let store = MemoryStore::with_contents("garbage");

        let report = set_color_reporting(&bus, &store, &SetRequest::new("ffffff"));
        assert!(matches!(
            report.outcome,
            SetOutcome::Failed {
                error: Error::MissingIdentity,
                ..
            }
        ));
        assert!(matches!(report.ignored_config, Some(Error::ConfigCorrupt(_))));
        assert!(report.config_warning().is_some());
    }

    /// Test: saved custom endpoint and template are used for the write.
    #[test]
    fn saved_endpoint_and_template_are_used() {
        let bus = create_mock_bus();
        let saved = StoredConfig {
            vid: Some(HexOrInt::Hex("0416".into())),
            pid: Some(HexOrInt::Hex("7399".into())),
            endpoint: 1,
            packet_header: "aa".into(),
            packet_footer: "bb".into(),
        };
        let store = MemoryStore::with_contents(to_json(&saved).unwrap());

        assert!(set_color(&bus, &store, &SetRequest::new("010203")).is_success());

        let writes = bus.writes();
        assert_eq!(writes[0].endpoint, 1);
        assert_eq!(writes[0].data, vec![0xAA, 0x01, 0x02, 0x03, 0xBB]);

        // String ids from an older file are rewritten as integers.
        let resaved = store.load().unwrap().unwrap();
        assert_eq!(resaved.vid, Some(HexOrInt::Int(0x0416)));
        assert_eq!(resaved.packet_header, "aa");
    }

    /// Test: claim refused by the host, nothing written or saved.
    #[test]
    fn claim_refusal_is_reported() {
        let bus = create_mock_bus();
        bus.refuse_claim("access denied");
        let store = MemoryStore::new();

        let outcome = set_color(&bus, &store, &SetRequest::new("ff0000").with_ids("0416", "7399"));
        assert!(matches!(
            outcome,
            SetOutcome::Failed {
                stage: Stage::Locate,
                error: Error::ClaimFailed(_)
            }
        ));
        assert!(outcome.diagnostic().unwrap().contains("access denied"));
        assert!(bus.writes().is_empty());
        assert_eq!(store.contents(), None);
    }
}
