use log::{info, warn};
use modemsock::sim::SimModem;
use modemsock::{
    AvailabilityPolicy, Config, DatagramSocket, Modem, SharedModem, StdClock, StreamSocket,
};
use std::time::Instant;

const MUX_COUNT: usize = 4;
const REQUEST: &[u8] = b"GET /status HTTP/1.0\r\n\r\n";
const REPLY: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok";

fn parse_policy(arg: &str) -> Option<AvailabilityPolicy> {
    match arg {
        "push" | "a" => Some(AvailabilityPolicy::NoModemBuffer),
        "no-check" | "b" => Some(AvailabilityPolicy::ReadNoCheck),
        "check-size" | "c" => Some(AvailabilityPolicy::ReadAndCheckSize),
        _ => None,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let policies: Vec<AvailabilityPolicy> = match std::env::args().nth(1) {
        Some(arg) => match parse_policy(&arg) {
            Some(policy) => vec![policy],
            None => {
                warn!("Unknown policy {:?}, expected push|no-check|check-size", arg);
                return;
            }
        },
        None => vec![
            AvailabilityPolicy::NoModemBuffer,
            AvailabilityPolicy::ReadNoCheck,
            AvailabilityPolicy::ReadAndCheckSize,
        ],
    };

    for policy in policies {
        info!("=== Policy {:?} ===", policy);
        let sim = SimModem::new(policy, MUX_COUNT);
        let modem = Modem::new(
            Box::new(sim.clone()),
            Box::new(StdClock::new()),
            Config::default().with_io_timeout_ms(200),
        )
        .into_shared();

        run_stream(&modem, &sim);
        run_datagram(&modem, &sim);
    }
}

fn run_stream(modem: &SharedModem, sim: &SimModem) {
    let mut client = StreamSocket::new(modem, 0).expect("Failed to claim channel 0");
    client
        .connect("status.example", 80)
        .expect("Failed to connect");
    info!("Connected on channel {}", client.channel());

    let sent = client.write(REQUEST).expect("Failed to send request");
    info!("Sent {} bytes", sent);

    // The simulated peer answers and hangs up.
    sim.inject(client.channel(), REPLY);
    sim.peer_close(client.channel());

    let start = Instant::now();
    let mut reply = Vec::new();
    let mut buf = [0u8; 16];
    while client.connected() {
        let n = client.read(&mut buf);
        reply.extend_from_slice(&buf[..n]);
    }
    let elapsed = start.elapsed();

    info!("=== Receive Complete ===");
    info!("Total received: {} bytes", reply.len());
    info!("Time: {:.3} seconds", elapsed.as_secs_f64());
    info!("Reply: {:?}", String::from_utf8_lossy(&reply));

    client.stop();
}

fn run_datagram(modem: &SharedModem, sim: &SimModem) {
    let mut udp = DatagramSocket::new(modem, 1).expect("Failed to claim channel 1");
    udp.begin(5000).expect("Failed to bind");

    udp.begin_packet_ip([192, 168, 1, 10], 5000);
    udp.write(b"temp=");
    udp.write(b"21.5");
    let sent = udp.end_packet().expect("Failed to send datagram");
    info!(
        "Datagram of {} bytes sent to {:?}:{}",
        sent,
        udp.remote_ip(),
        udp.remote_port()
    );

    if let Some(packet) = sim.sent().last() {
        info!("Module transmitted {:?}", String::from_utf8_lossy(&packet.data));
    }

    udp.stop();
}
