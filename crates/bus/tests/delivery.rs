use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use stationbus::{
    DeviceId, DeviceNetwork, NoPositions, OpenParams, Outbox, Packet, Payload, Transport,
};

type Recorder = Rc<RefCell<Vec<Packet>>>;

fn recorder() -> Recorder {
    Rc::new(RefCell::new(Vec::new()))
}

fn recording(recorder: &Recorder) -> impl FnMut(&Packet, &mut Outbox) + 'static {
    let recorder = Rc::clone(recorder);
    move |packet: &Packet, _: &mut Outbox| recorder.borrow_mut().push(packet.clone())
}

fn wired(network: u32, frequency: u32, address: &str, device: u64) -> OpenParams {
    OpenParams {
        network,
        frequency,
        address: Some(address.to_string()),
        device: DeviceId(device),
        transport: Transport::Wired,
        receive_all: false,
    }
}

fn wireless(network: u32, frequency: u32, address: &str, device: u64, range: f32) -> OpenParams {
    OpenParams {
        transport: Transport::wireless(range),
        ..wired(network, frequency, address, device)
    }
}

#[test]
fn test_unicast_exactness() {
    let mut network = DeviceNetwork::new();
    let (rx_a, rx_b, rx_c) = (recorder(), recorder(), recorder());

    let a = network.open(wired(1, 10, "a", 1), recording(&rx_a)).unwrap();
    network.open(wired(1, 10, "b", 2), recording(&rx_b)).unwrap();
    network.open(wired(1, 10, "c", 3), recording(&rx_c)).unwrap();

    let payload = Payload::new().with("cmd", "open");
    assert!(network.send(a, 10, "b", payload, &NoPositions));
    network.tick(&NoPositions);

    let received = rx_b.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender_address(), "a");
    assert_eq!(received[0].payload().get("cmd"), Some("open"));
    assert!(rx_a.borrow().is_empty());
    assert!(rx_c.borrow().is_empty());
}

#[test]
fn test_broadcast_fanout() {
    let mut network = DeviceNetwork::new();
    let (rx_b, rx_c, rx_other) = (recorder(), recorder(), recorder());

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "b", 2), recording(&rx_b)).unwrap();
    network.open(wired(1, 10, "c", 3), recording(&rx_c)).unwrap();
    network
        .open(wired(1, 20, "d", 4), recording(&rx_other))
        .unwrap();

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert_eq!(rx_b.borrow().len(), 1);
    assert_eq!(rx_c.borrow().len(), 1);
    assert!(rx_b.borrow()[0].is_broadcast());
    // Different frequency, not a sniffer: no delivery.
    assert!(rx_other.borrow().is_empty());
}

#[test]
fn test_no_self_delivery_on_broadcast() {
    let mut network = DeviceNetwork::new();
    let rx_a = recorder();

    let a = network.open(wired(1, 10, "a", 1), recording(&rx_a)).unwrap();
    network.open(wired(1, 10, "b", 2), |_, _| {}).unwrap();

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert!(rx_a.borrow().is_empty());
}

#[test]
fn test_sniffer_sees_unicast_exactly_once() {
    let mut network = DeviceNetwork::new();
    let (rx_b, rx_sniff) = (recorder(), recorder());

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "b", 2), recording(&rx_b)).unwrap();
    let sniffer = OpenParams {
        receive_all: true,
        // A sniffer listening on a completely different frequency.
        ..wired(1, 90, "sniffer", 3)
    };
    network.open(sniffer, recording(&rx_sniff)).unwrap();

    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert_eq!(rx_b.borrow().len(), 1);
    assert_eq!(rx_sniff.borrow().len(), 1);
    assert_eq!(rx_sniff.borrow()[0].recipient_address(), Some("b"));
}

#[test]
fn test_sniffer_matching_by_address_delivered_once() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    let target = OpenParams {
        receive_all: true,
        ..wired(1, 10, "b", 2)
    };
    network.open(target, recording(&rx)).unwrap();

    // Matches both as the addressed recipient and as a sniffer.
    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert_eq!(rx.borrow().len(), 1);
}

#[test]
fn test_deferred_reply_lands_next_pass() {
    let mut network = DeviceNetwork::new();
    let rx_a = recorder();

    let a = network.open(wired(1, 10, "a", 1), recording(&rx_a)).unwrap();
    network
        .open(wired(1, 10, "b", 2), |packet: &Packet, outbox: &mut Outbox| {
            let reply = Payload::new().with("cmd", "pong");
            outbox.send(packet.frequency(), packet.sender_address(), reply);
        })
        .unwrap();

    network.send(a, 10, "b", Payload::new().with("cmd", "ping"), &NoPositions);
    network.tick(&NoPositions);

    // The reply was enqueued during the pass, not delivered by it.
    assert!(rx_a.borrow().is_empty());
    assert_eq!(network.pending_packets(1), 1);

    network.tick(&NoPositions);
    let received = rx_a.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload().get("cmd"), Some("pong"));
    assert_eq!(received[0].sender_address(), "b");
}

#[test]
fn test_reply_ping_pong_is_one_hop_per_tick() {
    let mut network = DeviceNetwork::new();
    let count_a = Rc::new(RefCell::new(0u32));
    let count_b = Rc::new(RefCell::new(0u32));

    let echo = |count: &Rc<RefCell<u32>>| {
        let count = Rc::clone(count);
        move |packet: &Packet, outbox: &mut Outbox| {
            *count.borrow_mut() += 1;
            outbox.send(packet.frequency(), packet.sender_address(), Payload::new());
        }
    };

    let a = network.open(wired(1, 10, "a", 1), echo(&count_a)).unwrap();
    network.open(wired(1, 10, "b", 2), echo(&count_b)).unwrap();

    network.send(a, 10, "b", Payload::new(), &NoPositions);
    for _ in 0..6 {
        network.tick(&NoPositions);
    }

    // Each tick moves the ball exactly one hop.
    assert_eq!(*count_b.borrow(), 3);
    assert_eq!(*count_a.borrow(), 3);
}

#[test]
fn test_wireless_range_boundary() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let mut positions = HashMap::new();
    positions.insert(DeviceId(1), Vec2::ZERO);
    positions.insert(DeviceId(2), Vec2::new(5.0, 0.0));

    let sender = network
        .open(wireless(2, 10, "tx", 1, 50.0), |_, _| {})
        .unwrap();
    network
        .open(wireless(2, 10, "rx", 2, 5.0), recording(&rx))
        .unwrap();

    network.broadcast(sender, 10, Payload::new(), &positions);
    network.tick(&positions);
    assert_eq!(rx.borrow().len(), 1, "distance 5.0 is inside an inclusive range of 5");

    positions.insert(DeviceId(2), Vec2::new(5.0001, 0.0));
    network.broadcast(sender, 10, Payload::new(), &positions);
    network.tick(&positions);
    assert_eq!(rx.borrow().len(), 1, "distance 5.0001 is out of range");
}

#[test]
fn test_wireless_missing_position_delivers() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    // No position known for either device.
    let sender = network
        .open(wireless(2, 10, "tx", 1, 1.0), |_, _| {})
        .unwrap();
    network
        .open(wireless(2, 10, "rx", 2, 1.0), recording(&rx))
        .unwrap();

    network.broadcast(sender, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert_eq!(rx.borrow().len(), 1);
}

#[test]
fn test_wireless_metadata_carries_sender_position() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let mut positions = HashMap::new();
    positions.insert(DeviceId(1), Vec2::new(3.0, 4.0));
    positions.insert(DeviceId(2), Vec2::ZERO);

    let sender = network
        .open(wireless(2, 10, "tx", 1, 50.0), |_, _| {})
        .unwrap();
    network
        .open(wireless(2, 10, "rx", 2, 50.0), recording(&rx))
        .unwrap();

    network.broadcast(sender, 10, Payload::new(), &positions);
    network.tick(&positions);

    let received = rx.borrow();
    assert_eq!(received[0].metadata().position(), Some(Vec2::new(3.0, 4.0)));
}

#[test]
fn test_cross_network_isolation() {
    let mut network = DeviceNetwork::new();
    let (rx_one, rx_two) = (recorder(), recorder());

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "b", 2), recording(&rx_one)).unwrap();
    // Same frequency and address on a different network id.
    network.open(wired(2, 10, "b", 3), recording(&rx_two)).unwrap();

    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);

    assert_eq!(rx_one.borrow().len(), 1);
    assert!(rx_two.borrow().is_empty());
}

#[test]
fn test_callback_panic_does_not_halt_delivery() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    // Lower id, delivered first, panics every time.
    network
        .open(wired(1, 10, "boom", 2), |_: &Packet, _: &mut Outbox| {
            panic!("malfunctioning device")
        })
        .unwrap();
    network.open(wired(1, 10, "c", 3), recording(&rx)).unwrap();

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(rx.borrow().len(), 1);

    // Subsequent packets keep flowing too.
    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(rx.borrow().len(), 2);
}

#[test]
fn test_closed_sender_packet_still_delivered() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "b", 2), recording(&rx)).unwrap();

    assert!(network.send(a, 10, "b", Payload::new(), &NoPositions));
    assert!(network.close(a));
    network.tick(&NoPositions);

    let received = rx.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender_address(), "a");
}

#[test]
fn test_close_does_not_affect_other_connections() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    let b = network.open(wired(1, 10, "b", 2), |_, _| {}).unwrap();
    network.open(wired(1, 10, "c", 3), recording(&rx)).unwrap();

    assert!(network.close(b));
    assert!(!network.close(b));

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(rx.borrow().len(), 1);
}

#[test]
fn test_close_from_callback_applies_after_delivery() {
    let mut network = DeviceNetwork::new();
    let count = Rc::new(RefCell::new(0u32));

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    let once = {
        let count = Rc::clone(&count);
        move |_: &Packet, outbox: &mut Outbox| {
            *count.borrow_mut() += 1;
            outbox.close();
        }
    };
    let b = network.open(wired(1, 10, "b", 2), once).unwrap();

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(*count.borrow(), 1);
    assert!(!network.is_open(b));

    network.broadcast(a, 10, Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(*count.borrow(), 1);
    assert!(!network.close(b));
}

#[test]
fn test_receive_all_toggle() {
    let mut network = DeviceNetwork::new();
    let rx = recorder();

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "b", 2), |_, _| {}).unwrap();
    let watcher = network.open(wired(1, 50, "w", 3), recording(&rx)).unwrap();

    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert!(rx.borrow().is_empty());

    assert!(network.set_receive_all(watcher, true));
    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(rx.borrow().len(), 1);

    assert!(network.set_receive_all(watcher, false));
    network.send(a, 10, "b", Payload::new(), &NoPositions);
    network.tick(&NoPositions);
    assert_eq!(rx.borrow().len(), 1);
}

#[test]
fn test_delivery_order_is_open_order() {
    let mut network = DeviceNetwork::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let tag = |name: &'static str| {
        let order = Rc::clone(&order);
        move |_: &Packet, _: &mut Outbox| order.borrow_mut().push(name)
    };

    let a = network.open(wired(1, 10, "a", 1), |_, _| {}).unwrap();
    network.open(wired(1, 10, "first", 2), tag("first")).unwrap();
    network.open(wired(1, 10, "second", 3), tag("second")).unwrap();
    network.open(wired(1, 10, "third", 4), tag("third")).unwrap();

    for _ in 0..3 {
        network.broadcast(a, 10, Payload::new(), &NoPositions);
        network.tick(&NoPositions);
    }

    let order = order.borrow();
    let expected: Vec<&str> = ["first", "second", "third"].repeat(3);
    assert_eq!(*order, expected);
}
