//! Property-based tests for delivery and window invariants.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use rdt_layer::receiver::ReceiveBuffer;
use rdt_layer::segment::DataSegment;
use rdt_layer::{RdtConfig, RdtLayer, SimulatorConfig, UnreliableChannel};

/// Generate a valid protocol configuration.
fn rdt_config() -> impl Strategy<Value = RdtConfig> {
    (1usize..=8, 1usize..=32, 1u64..=6).prop_map(|(payload_size, extra, timeout_ticks)| {
        RdtConfig {
            payload_size,
            window_size: payload_size + extra,
            timeout_ticks,
        }
    })
}

/// Generate a fault model that still lets traffic through.
fn fault_model() -> impl Strategy<Value = SimulatorConfig> {
    (
        0.0f64..0.3,
        0.0f64..0.3,
        0.0f64..0.3,
        0.0f64..0.5,
        0u64..=4,
        0.0f64..0.5,
    )
        .prop_map(
            |(loss_rate, corrupt_rate, duplicate_rate, delay_rate, max_delay, reorder_rate)| {
                SimulatorConfig {
                    loss_rate,
                    corrupt_rate,
                    duplicate_rate,
                    delay_rate,
                    max_delay,
                    reorder_rate,
                }
            },
        )
}

/// Cut `data` into the segments a sender with `payload_size` would emit.
fn segments_of(data: &[u8], payload_size: usize) -> Vec<DataSegment> {
    data.chunks(payload_size)
        .enumerate()
        .map(|(i, chunk)| DataSegment::new((i * payload_size) as u32, chunk.to_vec()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn lossy_transfer_delivers_exact_prefix_then_everything(
        data in prop::collection::vec(any::<u8>(), 0..160),
        config in rdt_config(),
        faults in fault_model(),
        seed in any::<u64>(),
    ) {
        let mut client = RdtLayer::new(config).unwrap();
        client.configure_outbound_data(data.clone()).unwrap();
        let mut server = RdtLayer::new(config).unwrap();
        let mut c2s = UnreliableChannel::new(faults.clone(), seed).unwrap();
        let mut s2c = UnreliableChannel::new(faults, seed ^ 0x5a5a).unwrap();

        while server.delivered_data() != data.as_slice() {
            client.tick(&mut c2s, &mut s2c);
            server.tick(&mut s2c, &mut c2s);
            c2s.advance();
            s2c.advance();

            let delivered = server.delivered_data();
            prop_assert!(data.starts_with(delivered));
            prop_assert_eq!(delivered.len(), server.next_recv_seq() as usize);
            prop_assert!(client.stats().bytes_in_flight <= config.window_size);
            prop_assert!(client.send_window_base() <= client.next_send_seq());
            prop_assert!(server.current_tick() < 200_000, "transfer stalled");
        }
    }

    #[test]
    fn any_arrival_order_reassembles(
        data in prop::collection::vec(any::<u8>(), 1..120),
        payload_size in 1usize..=8,
        dup_mask in prop::collection::vec(any::<bool>(), 0..40),
        order_seed in any::<u64>(),
    ) {
        let mut segments = segments_of(&data, payload_size);
        for (i, dup) in dup_mask.iter().enumerate() {
            if *dup && i < segments.len() {
                segments.push(segments[i].clone());
            }
        }
        segments.shuffle(&mut StdRng::seed_from_u64(order_seed));

        let mut r = ReceiveBuffer::new();
        for s in segments {
            r.on_segment(s);
            prop_assert!(data.starts_with(r.delivered()));
        }
        prop_assert_eq!(r.delivered(), data.as_slice());
        prop_assert_eq!(r.buffered(), 0);
    }
}
