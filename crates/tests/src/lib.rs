//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟扫描仪 e2e 测试 (MockTransport -> AcquisitionLoop -> OutputChannel)
//! - 取消与故障注入

#[cfg(test)]
mod fixtures {
    use contracts::{BitDepth, ChannelConfig, ChannelCount, RawLayout, ScanConfig, ScanGeometry};

    pub fn gray(pixels: u32, lines: u32, budget: u32) -> ScanConfig {
        ScanConfig {
            geometry: ScanGeometry {
                pixels_per_line: pixels,
                total_output_lines: lines,
                bytes_per_raw_line: pixels,
                channel_count: ChannelCount::One,
                bit_depth: BitDepth::Eight,
            },
            channels: vec![ChannelConfig::passthrough(300)],
            raw_layout: RawLayout::ChannelMajor,
            raw_channel_order: None,
            mirror: false,
            invert: false,
            line_budget: budget,
            native_lines: None,
            double_buffering: true,
            block_lines: None,
            strip_lines: None,
        }
    }

    pub fn color(pixels: u32, lines: u32, budget: u32, skews: [u32; 3]) -> ScanConfig {
        let mut config = gray(pixels, lines, budget);
        config.geometry.channel_count = ChannelCount::Three;
        config.geometry.bytes_per_raw_line = pixels * 3;
        config.channels = skews
            .iter()
            .map(|&skew| ChannelConfig {
                skew,
                native_rate: 300,
                target_rate: 300,
            })
            .collect();
        config
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{LineShortfall, OutputStatus, ScanOutcome, ScanReport};

    #[test]
    fn test_report_accounting() {
        let mut report = ScanReport::new(ScanOutcome::Completed, 12);
        assert!(report.is_complete());

        report.shortfall = Some(LineShortfall { expected: 12, emitted: 9 });
        assert!(!report.is_complete());

        report.shortfall = None;
        report.outcome = ScanOutcome::Cancelled;
        assert!(!report.is_complete());
        assert!(OutputStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_fixtures_are_valid() {
        assert!(crate::fixtures::gray(8, 4, 2).check().is_ok());
        assert!(crate::fixtures::color(8, 4, 2, [0, 4, 8]).check().is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use acquisition::{
        document_sample, start, MockScanner, MockTransport, ScanError, ScanPlan, TransportEvent,
    };
    use contracts::{
        BitDepth, ChannelConfig, ChannelCount, LineShortfall, OutputStatus, RawLayout,
        ScanConfig, ScanOutcome, ScanReport, TransportError,
    };
    use output::OutputChannel;

    use crate::fixtures::{color, gray};

    type Outcome = Result<ScanReport, ScanError>;

    /// Run one scan and drain its output
    async fn scan(config: ScanConfig, transport: MockTransport) -> (Vec<u8>, OutputStatus, Outcome) {
        let (writer, mut reader) = OutputChannel::bounded(4);
        let handle = start(config, transport, writer).unwrap();
        let data = reader.read_to_end().await;
        let outcome = handle.join().await;
        (data, reader.status(), outcome)
    }

    fn issued(events: &[TransportEvent]) -> Vec<(usize, u32)> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Issue { slot, lines, .. } => Some((*slot, *lines)),
                _ => None,
            })
            .collect()
    }

    /// End-to-end: MockTransport -> AcquisitionLoop -> OutputChannel
    #[tokio::test]
    async fn test_e2e_gray_passthrough() {
        let config = gray(16, 40, 7);
        let plan = ScanPlan::from_config(&config);
        let expected = MockScanner::expected_output(&config, plan.native_lines);
        let transport = MockTransport::new(&config);
        let log = transport.log();

        let (data, status, outcome) = scan(config, transport).await;
        let report = outcome.unwrap();

        assert_eq!(data.len(), 40 * 16);
        assert_eq!(data, expected);
        assert_eq!(status, OutputStatus::Completed);
        assert_eq!(report.emitted_lines, 40);
        assert_eq!(report.native_lines_requested, 40);
        assert_eq!(report.native_lines_received, 40);
        assert_eq!(report.requests_issued, plan.request_count());
        assert!(report.is_complete());
        assert!(log.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_e2e_skew_correction() {
        let config = color(4, 10, 4, [0, 2, 5]);
        assert_eq!(ScanPlan::from_config(&config).native_lines, 15);

        let (data, status, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
        let report = outcome.unwrap();

        assert_eq!(status, OutputStatus::Completed);
        assert_eq!(report.emitted_lines, 10);
        assert_eq!(report.native_lines_received, 15);
        assert_eq!(report.pending_rows_discarded, 0);
        assert_eq!(data, MockScanner::expected_output(&config, 15));

        // every output row carries one document line in all three channels
        for (k, row) in data.chunks_exact(12).enumerate() {
            for (p, px) in row.chunks_exact(3).enumerate() {
                for (c, &sample) in px.iter().enumerate() {
                    assert_eq!(
                        sample,
                        document_sample(k as u64, c, p) as u8,
                        "row {k} pixel {p} channel {c}"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_e2e_half_rate() {
        let mut config = gray(8, 50, 16);
        config.channels[0] = ChannelConfig {
            skew: 0,
            native_rate: 600,
            target_rate: 300,
        };
        let plan = ScanPlan::from_config(&config);
        assert_eq!(plan.native_lines, 99);

        let (data, _, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
        let report = outcome.unwrap();

        assert_eq!(report.emitted_lines, 50);
        assert!(report.is_complete());
        // every other document line survives
        for (k, row) in data.chunks_exact(8).enumerate() {
            assert_eq!(row[0], document_sample(2 * k as u64, 0, 0) as u8, "row {k}");
        }
    }

    #[tokio::test]
    async fn test_output_independent_of_request_size() {
        let reference = MockScanner::expected_output(&color(6, 30, 1, [0, 3, 6]), 36);
        for budget in [1, 2, 5, 8, 13, 64] {
            let config = color(6, 30, budget, [0, 3, 6]);
            let (data, _, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
            outcome.unwrap();
            assert_eq!(data, reference, "budget {budget}");
        }
    }

    #[tokio::test]
    async fn test_interleaved_layout_with_channel_order() {
        let mut config = color(5, 12, 3, [4, 0, 2]);
        config.raw_layout = RawLayout::SampleInterleaved;
        config.raw_channel_order = Some(vec![2, 0, 1]);
        config.mirror = true;
        config.invert = true;
        let plan = ScanPlan::from_config(&config);

        let (data, _, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
        outcome.unwrap();

        assert_eq!(data, MockScanner::expected_output(&config, plan.native_lines));
        // mirrored: last pixel of row 0 holds pixel 0, inverted
        let row = &data[..15];
        assert_eq!(row[12], !(document_sample(0, 0, 0) as u8));
        assert_eq!(row[14], !(document_sample(0, 2, 0) as u8));
    }

    #[tokio::test]
    async fn test_sixteen_bit_samples_move_as_units() {
        let mut config = color(3, 6, 4, [0, 1, 2]);
        config.geometry.bit_depth = BitDepth::Sixteen;
        config.geometry.bytes_per_raw_line = 3 * 3 * 2;
        config.mirror = true;

        let (data, _, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
        outcome.unwrap();

        assert_eq!(data.len(), 6 * 18);
        let last = &data[12..18];
        let first_pixel: Vec<u8> = (0..3)
            .flat_map(|c| document_sample(0, c, 0).to_be_bytes())
            .collect();
        assert_eq!(last, &first_pixel[..]);
    }

    #[tokio::test]
    async fn test_lineart_scan() {
        let mut config = gray(20, 8, 3);
        config.geometry.bit_depth = BitDepth::One;
        config.geometry.bytes_per_raw_line = 3;
        config.invert = true;
        assert_eq!(config.geometry.channel_row_bytes(), 3);

        let (data, _, outcome) = scan(config.clone(), MockTransport::new(&config)).await;
        outcome.unwrap();
        assert_eq!(data, MockScanner::expected_output(&config, 8));
        // 20 pixels: the low nibble of each row's last byte is padding
        assert!(data.chunks_exact(3).all(|row| row[2] & 0x0f == 0));
    }

    #[tokio::test]
    async fn test_buffers_alternate() {
        let config = gray(8, 24, 4);
        let transport = MockTransport::new(&config);
        let log = transport.log();

        let (_, _, outcome) = scan(config, transport).await;
        outcome.unwrap();

        let slots: Vec<usize> = issued(&log.events()).into_iter().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(log.max_in_flight(), 2);

        // a buffer is only re-issued after its own completion
        let events = log.events();
        for (i, event) in events.iter().enumerate() {
            let TransportEvent::Issue { slot, .. } = event else { continue };
            let earlier_issue = events[..i]
                .iter()
                .rposition(|e| matches!(e, TransportEvent::Issue { slot: s, .. } if s == slot));
            if let Some(prev) = earlier_issue {
                let completed = events[prev..i]
                    .iter()
                    .any(|e| matches!(e, TransportEvent::Complete { slot: s, .. } if s == slot));
                assert!(completed, "slot {slot} re-issued while in flight");
            }
        }
    }

    #[tokio::test]
    async fn test_single_buffer_never_overlaps() {
        let mut config = gray(8, 10, 3);
        config.double_buffering = false;
        let transport = MockTransport::new(&config);
        let log = transport.log();

        let (data, _, outcome) = scan(config.clone(), transport).await;
        outcome.unwrap();

        assert_eq!(log.max_in_flight(), 1);
        assert_eq!(data, MockScanner::expected_output(&config, 10));
    }

    #[tokio::test]
    async fn test_block_reads_drain_before_next_block() {
        let mut config = gray(8, 10, 4);
        config.block_lines = Some(6);
        let transport = MockTransport::new(&config);
        let log = transport.log();

        let (data, _, outcome) = scan(config.clone(), transport).await;
        let report = outcome.unwrap();

        assert_eq!(report.blocks_started, 2);
        assert_eq!(data, MockScanner::expected_output(&config, 10));

        let events = log.events();
        let blocks: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::BeginBlock { lines } => Some(*lines),
                _ => None,
            })
            .collect();
        assert_eq!(blocks, vec![6, 4]);
        assert_eq!(
            issued(&events).into_iter().map(|(_, l)| l).collect::<Vec<_>>(),
            vec![4, 2, 4]
        );

        let second = events
            .iter()
            .rposition(|e| matches!(e, TransportEvent::BeginBlock { .. }))
            .unwrap();
        let completes_before = events[..second]
            .iter()
            .filter(|e| matches!(e, TransportEvent::Complete { .. }))
            .count();
        assert_eq!(completes_before, 2);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_output() {
        let config = color(4, 20, 3, [0, 1, 2]);
        let transport = MockTransport::new(&config).fail_on_request(3, TransportError::CoverOpen);
        let log = transport.log();

        let (data, status, outcome) = scan(config.clone(), transport).await;

        assert!(matches!(
            outcome,
            Err(ScanError::Transport(TransportError::CoverOpen))
        ));
        assert!(matches!(status, OutputStatus::Failed(ref reason) if reason.contains("cover open")));
        let expected = MockScanner::expected_output(&config, 22);
        assert_eq!(data, expected[..data.len()]);
        assert!(log.count(|e| *e == TransportEvent::CancelHint) == 1);
    }

    #[tokio::test]
    async fn test_short_document_reports_shortfall() {
        let config = gray(8, 10, 4);
        let transport = MockTransport::new(&config).deliver_lines(7);

        let (data, status, outcome) = scan(config, transport).await;
        let report = outcome.unwrap();

        assert_eq!(status, OutputStatus::Completed);
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.emitted_lines, 7);
        assert_eq!(report.native_lines_requested, 10);
        assert_eq!(report.native_lines_received, 7);
        assert_eq!(report.shortfall, Some(LineShortfall { expected: 10, emitted: 7 }));
        assert_eq!(data.len(), 7 * 8);
    }

    #[tokio::test]
    async fn test_short_skewed_document_discards_pending_rows() {
        let config = color(2, 10, 4, [0, 2, 5]);
        // 8 raw lines: channel 2 forwards 3 rows, channel 1 six, channel 0 eight
        let transport = MockTransport::new(&config).deliver_lines(8);

        let (data, _, outcome) = scan(config, transport).await;
        let report = outcome.unwrap();

        assert_eq!(report.emitted_lines, 3);
        assert_eq!(report.pending_rows_discarded, 5 + 3);
        assert_eq!(data.len(), 3 * 6);
    }

    #[tokio::test]
    async fn test_partial_trailing_line_is_dropped() {
        let config = gray(4, 10, 4);
        // request 0 delivers two and a half lines
        let transport = MockTransport::new(&config).truncate_request(0, 10);

        let (data, status, outcome) = scan(config.clone(), transport).await;
        let report = outcome.unwrap();

        assert_eq!(status, OutputStatus::Completed);
        assert_eq!(report.emitted_lines, 8);
        assert_eq!(report.shortfall.map(|s| s.missing()), Some(2));

        let full = MockScanner::expected_output(&config, 10);
        assert_eq!(&data[..8], &full[..8]);
        assert_eq!(&data[8..], &full[16..]);
    }

    #[tokio::test]
    async fn test_invalid_config_touches_nothing() {
        let mut config = color(4, 10, 4, [0, 1, 2]);
        config.channels[1].native_rate = 600;
        let transport = MockTransport::new(&config);
        let log = transport.log();
        let (writer, reader) = OutputChannel::bounded(4);

        let err = start(config, transport, writer).unwrap_err();

        assert!(matches!(err, ScanError::Configuration(_)));
        assert!(log.events().is_empty());
        assert!(matches!(reader.status(), OutputStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_one_bit_colour_rejected() {
        let mut config = color(8, 4, 4, [0, 0, 0]);
        config.geometry.bit_depth = BitDepth::One;
        config.geometry.channel_count = ChannelCount::Three;
        let (writer, _reader) = OutputChannel::bounded(1);
        let err = start(config.clone(), MockTransport::new(&config), writer).unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_scan_metrics_snapshot() {
        let config = gray(4, 9, 4);
        let transport = MockTransport::new(&config);
        let (writer, mut reader) = OutputChannel::bounded(4);

        let handle = start(config, transport, writer).unwrap();
        reader.read_to_end().await;
        let metrics = handle.metrics();
        handle.join().await.unwrap();

        assert_eq!(metrics.requests_issued, 3);
        assert_eq!(metrics.requests_completed, 3);
        assert_eq!(metrics.lines_requested, 9);
        assert_eq!(metrics.lines_received, 9);
        assert_eq!(metrics.lines_emitted, 9);
        assert_eq!(metrics.short_reads, 0);
        assert_eq!(reader.metrics().bytes_written, 36);
        assert_eq!(reader.metrics().bytes_read, 36);
    }
}

#[cfg(test)]
mod cancel_tests {
    use std::time::Duration;

    use acquisition::{start, MockScanner, MockTransport, ScanPlan, TransportEvent};
    use contracts::{OutputStatus, ScanOutcome};
    use output::{OutputChannel, OutputError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::fixtures::{color, gray};

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_cancel_while_request_stalled() {
        let config = gray(8, 40, 4);
        let transport = MockTransport::new(&config).stall_on_request(2);
        let log = transport.log();
        let (writer, mut reader) = OutputChannel::bounded(8);

        let handle = start(config, transport, writer).unwrap();
        let token = handle.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let data = tokio::time::timeout(DEADLINE, reader.read_to_end())
            .await
            .expect("reader must see end of stream");
        let report = tokio::time::timeout(DEADLINE, handle.join())
            .await
            .expect("worker must stop")
            .unwrap();

        assert_eq!(report.outcome, ScanOutcome::Cancelled);
        assert_eq!(reader.status(), OutputStatus::Cancelled);
        assert!(data.len() <= 8 * 8);
        assert_eq!(log.count(|e| *e == TransportEvent::CancelHint), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_late_cancel_is_noop() {
        let config = gray(4, 4, 4);
        let (writer, mut reader) = OutputChannel::bounded(4);
        let handle = start(config.clone(), MockTransport::new(&config), writer).unwrap();

        let data = reader.read_to_end().await;
        handle.cancel();
        handle.cancel();
        let report = handle.join().await.unwrap();

        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(reader.status(), OutputStatus::Completed);
        assert_eq!(data.len(), 16);
    }

    #[tokio::test]
    async fn test_randomized_cancellation() {
        let mut rng = StdRng::seed_from_u64(0x5ca9);

        for round in 0..24 {
            let budget = rng.random_range(1..=6);
            let config = color(4, 60, budget, [0, 2, 4]);
            let plan = ScanPlan::from_config(&config);
            let expected = MockScanner::expected_output(&config, plan.native_lines);
            let latency = Duration::from_micros(rng.random_range(200..2_000));
            let cancel_after = Duration::from_micros(rng.random_range(0..20_000));

            let transport = MockTransport::new(&config).with_latency(latency);
            let (writer, mut reader) = OutputChannel::bounded(rng.random_range(1..4));
            let handle = start(config, transport, writer).unwrap();
            let token = handle.cancel_token();
            tokio::spawn(async move {
                tokio::time::sleep(cancel_after).await;
                token.cancel();
            });

            let data = tokio::time::timeout(DEADLINE, reader.read_to_end())
                .await
                .unwrap_or_else(|_| panic!("round {round}: reader blocked"));
            let report = tokio::time::timeout(DEADLINE, handle.join())
                .await
                .unwrap_or_else(|_| panic!("round {round}: worker blocked"))
                .unwrap();

            // whatever arrived is a prefix of the full scan
            assert_eq!(data, expected[..data.len()], "round {round}");

            match report.outcome {
                ScanOutcome::Cancelled => {
                    assert_eq!(reader.status(), OutputStatus::Cancelled, "round {round}");
                    let mut buf = [0u8; 16];
                    assert_eq!(reader.read(&mut buf).await, 0);
                    assert_eq!(reader.try_read(&mut buf), Ok(0));
                }
                ScanOutcome::Completed => {
                    assert_eq!(reader.status(), OutputStatus::Completed, "round {round}");
                    assert_eq!(data.len(), expected.len(), "round {round}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_reader_stops_scan() {
        let config = gray(8, 200, 2);
        let transport = MockTransport::new(&config).with_latency(Duration::from_millis(1));
        let (writer, mut reader) = OutputChannel::bounded(1);
        let handle = start(config, transport, writer).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await, 8);
        drop(reader);

        let report = tokio::time::timeout(DEADLINE, handle.join())
            .await
            .expect("worker must stop")
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::Cancelled);
        assert!(report.emitted_lines < 200);
    }

    #[tokio::test]
    async fn test_try_read_consumer() {
        let config = gray(4, 12, 5);
        let expected = MockScanner::expected_output(&config, 12);
        let transport = MockTransport::new(&config).with_latency(Duration::from_millis(2));
        let (writer, mut reader) = OutputChannel::bounded(2);
        let handle = start(config, transport, writer).unwrap();

        let mut data = Vec::new();
        let mut buf = [0u8; 7];
        let mut would_block = 0;
        loop {
            match reader.try_read(&mut buf) {
                Ok(0) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(OutputError::WouldBlock) => {
                    would_block += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        handle.join().await.unwrap();

        assert_eq!(data, expected);
        assert!(would_block > 0);
        assert_eq!(reader.status(), OutputStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_consumer_thread() {
        let config = gray(6, 15, 4);
        let expected = MockScanner::expected_output(&config, 15);
        let (writer, mut reader) = OutputChannel::bounded(1);
        let handle = start(config.clone(), MockTransport::new(&config), writer).unwrap();

        let consumer = tokio::task::spawn_blocking(move || {
            let mut data = Vec::new();
            let mut buf = [0u8; 5];
            loop {
                let n = reader.blocking_read(&mut buf);
                if n == 0 {
                    return (data, reader.status());
                }
                data.extend_from_slice(&buf[..n]);
            }
        });

        let (data, status) = consumer.await.unwrap();
        handle.join().await.unwrap();
        assert_eq!(data, expected);
        assert_eq!(status, OutputStatus::Completed);
    }
}

#[cfg(test)]
mod profile_tests {
    use acquisition::{start, MockScanner, MockTransport, ScanPlan};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::OutputStatus;
    use output::OutputChannel;
    use reconstruction::required_native_lines;

    const PROFILE: &str = r#"
name = "color-ccd"
description = "RGB CCD, rows 0/4/8 lines apart, 600 -> 300 dpi"

[scan]
line_budget = 5
raw_layout = "channel_major"
raw_channel_order = [2, 1, 0]
mirror = true

[scan.geometry]
pixels_per_line = 6
total_output_lines = 16
bytes_per_raw_line = 18
channel_count = 3
bit_depth = 8

[[scan.channels]]
skew = 0
native_rate = 600
target_rate = 300

[[scan.channels]]
skew = 4
native_rate = 600
target_rate = 300

[[scan.channels]]
skew = 8
native_rate = 600
target_rate = 300
"#;

    #[tokio::test]
    async fn test_profile_drives_scan() {
        let profile = ConfigLoader::load_from_str(PROFILE, ConfigFormat::Toml).unwrap();
        let config = profile.scan;
        let plan = ScanPlan::from_config(&config);
        assert_eq!(plan.native_lines, 8 + 31);
        assert_eq!(plan.native_lines, required_native_lines(&config));

        let expected = MockScanner::expected_output(&config, plan.native_lines);
        let (writer, mut reader) = OutputChannel::bounded(4);
        let handle = start(config.clone(), MockTransport::new(&config), writer).unwrap();
        let data = reader.read_to_end().await;
        let report = handle.join().await.unwrap();

        observability::record_scan_report(&report, std::time::Duration::from_millis(1));
        assert!(report.is_complete());
        assert_eq!(report.emitted_lines, 16);
        assert_eq!(data, expected);
        assert_eq!(reader.status(), OutputStatus::Completed);
    }

    #[test]
    fn test_profile_round_trip_through_json() {
        let profile = ConfigLoader::load_from_str(PROFILE, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&profile).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(profile, again);
    }
}
