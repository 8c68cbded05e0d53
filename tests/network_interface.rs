use std::collections::HashSet;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};

use netiface::communicator::builtin::{
    DATA_ECHO_SERVER, DATA_INT_CLIENT, TEXT_ECHO_SERVER, TEXT_LINE_CLIENT,
    TEXT_MULTICAST_RECEIVER, TEXT_MULTICAST_SENDER,
};
use netiface::communicator::{
    CommunicatorError, CommunicatorResult, Framed, NetworkMessage, ObjectFraming,
    UnicastClientHandler, UnicastServerHandler,
};
use netiface::{
    register_builtin_communicators, AppError, AppResult, CommunicatorRegistry, NetworkInterface,
    NetworkInterfaceConfigType, NetworkInterfaceSettings, MULTICAST_PACKET_SIZE,
};

use NetworkInterfaceConfigType::{
    LocalMulticastClient, LocalUnicastServer, RemoteMulticastClient, RemoteUnicastServer,
};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    registry: Arc<CommunicatorRegistry>,
    interface: NetworkInterface,
    inbox: async_channel::Receiver<String>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.interface.close_all();
    }
}

fn test_settings() -> NetworkInterfaceSettings {
    NetworkInterfaceSettings {
        min_local_unicast_server_threads: 1,
        multicast_receive_poll_interval_ms: 20,
        ..Default::default()
    }
}

fn harness_with(settings: NetworkInterfaceSettings) -> Harness {
    let registry = Arc::new(CommunicatorRegistry::new());
    let inbox = register_builtin_communicators(&registry).unwrap();
    let interface = NetworkInterface::new(settings, registry.clone());
    Harness {
        registry,
        interface,
        inbox,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(test_settings())
}

fn free_tcp_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn as_i32(response: Option<Box<dyn NetworkMessage>>) -> Option<i32> {
    response
        .as_deref()
        .and_then(|message| message.downcast_ref::<i32>())
        .copied()
}

fn as_string(response: Option<Box<dyn NetworkMessage>>) -> Option<String> {
    response
        .as_deref()
        .and_then(|message| message.downcast_ref::<String>())
        .cloned()
}

fn wait_for_line(inbox: &async_channel::Receiver<String>) -> Option<String> {
    for _ in 0..(WAIT.as_millis() / 10) {
        if let Ok(line) = inbox.try_recv() {
            return Some(line);
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}

/// Starts a data echo server and a matching remote config pointing at it.
fn data_echo_pair(harness: &Harness, max_threads: usize) -> AppResult<u16> {
    let port = free_tcp_port();
    let interface = &harness.interface;
    interface.configure(LocalUnicastServer, "echo", DATA_ECHO_SERVER, "0.0.0.0", port, max_threads)?;
    interface.configure(RemoteUnicastServer, "remote", DATA_INT_CLIENT, "127.0.0.1", port, 1)?;
    interface.start_local_unicast_server("echo")?;
    Ok(port)
}

#[rstest]
fn test_duplicate_configure_keeps_first(harness: Harness) {
    let interface = &harness.interface;
    interface
        .configure(LocalUnicastServer, "echo", DATA_ECHO_SERVER, "0.0.0.0", 7000, 1)
        .unwrap();
    let err = interface
        .configure(LocalUnicastServer, "echo", DATA_ECHO_SERVER, "0.0.0.0", 7001, 1)
        .unwrap_err();

    assert!(matches!(err, AppError::ConfigExists(name) if name == "echo"));
    assert_eq!(interface.config("echo").unwrap().port(), 7000);
}

#[rstest]
#[case::client_as_server(LocalUnicastServer, DATA_INT_CLIENT)]
#[case::server_as_client(RemoteUnicastServer, TEXT_ECHO_SERVER)]
#[case::sender_as_receiver(LocalMulticastClient, TEXT_MULTICAST_SENDER)]
#[case::receiver_as_sender(RemoteMulticastClient, TEXT_MULTICAST_RECEIVER)]
#[case::unknown(LocalUnicastServer, "no-such-communicator")]
fn test_communicator_must_fit_config_type(
    harness: Harness,
    #[case] config_type: NetworkInterfaceConfigType,
    #[case] communicator: &str,
) {
    let err = harness
        .interface
        .configure(config_type, "endpoint", communicator, "127.0.0.1", 7000, 1)
        .unwrap_err();

    assert!(matches!(err, AppError::CommunicatorIncompatible { .. }));
    assert!(harness.interface.config("endpoint").is_none());
}

#[rstest]
fn test_operation_on_wrong_config_type(harness: Harness) -> AppResult<()> {
    let interface = &harness.interface;
    interface.configure(RemoteUnicastServer, "remote", DATA_INT_CLIENT, "127.0.0.1", 7000, 1)?;

    assert!(matches!(
        interface.start_local_unicast_server("remote"),
        Err(AppError::ConfigIncompatible {
            expected: LocalUnicastServer,
            actual: RemoteUnicastServer,
            ..
        })
    ));
    assert!(matches!(
        interface.establish_multicast("remote"),
        Err(AppError::ConfigIncompatible { .. })
    ));
    assert!(matches!(
        interface.is_local_multicast_client_running("remote"),
        Err(AppError::ConfigIncompatible { .. })
    ));
    assert!(matches!(
        interface.establish_unicast("missing"),
        Err(AppError::ConfigUnknown(name)) if name == "missing"
    ));
    Ok(())
}

#[test]
fn test_max_threads_is_floored() -> AppResult<()> {
    let harness = harness_with(NetworkInterfaceSettings {
        min_local_unicast_server_threads: 4,
        ..test_settings()
    });
    let interface = &harness.interface;
    interface.configure(LocalUnicastServer, "small", DATA_ECHO_SERVER, "0.0.0.0", 7000, 1)?;
    interface.configure(LocalUnicastServer, "large", DATA_ECHO_SERVER, "0.0.0.0", 7001, 16)?;

    assert_eq!(interface.config("small").unwrap().max_threads(), 4);
    assert_eq!(interface.config("large").unwrap().max_threads(), 16);
    Ok(())
}

#[rstest]
fn test_data_unicast_round_trip(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 2)?;
    let interface = &harness.interface;
    assert!(interface.is_local_unicast_server_running("echo")?);

    let session = interface.establish_unicast("remote")?;
    assert!(session.starts_with("remote"));
    assert_eq!(as_i32(interface.unicast(&session, &42i32)?), Some(42));
    assert_eq!(as_i32(interface.unicast(&session, &-7i32)?), Some(-7));

    interface.destroy_unicast(&session)?;
    assert!(matches!(
        interface.unicast(&session, &42i32),
        Err(AppError::UnicastSessionNotFound(_))
    ));
    assert!(matches!(
        interface.destroy_unicast(&session),
        Err(AppError::UnicastSessionNotFound(_))
    ));

    interface.stop_local_unicast_server("echo")?;
    assert!(!interface.is_local_unicast_server_running("echo")?);
    assert!(matches!(
        interface.stop_local_unicast_server("echo"),
        Err(AppError::UnicastServerNotStarted(_))
    ));
    Ok(())
}

#[rstest]
fn test_session_ids_are_unique(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 2)?;
    let first = harness.interface.establish_unicast("remote")?;
    let second = harness.interface.establish_unicast("remote")?;
    assert_ne!(first, second);
    Ok(())
}

#[rstest]
fn test_text_unicast_several_messages(harness: Harness) -> AppResult<()> {
    let port = free_tcp_port();
    let interface = &harness.interface;
    interface.configure(LocalUnicastServer, "text", TEXT_ECHO_SERVER, "0.0.0.0", port, 2)?;
    interface.configure(RemoteUnicastServer, "peer", TEXT_LINE_CLIENT, "127.0.0.1", port, 1)?;
    interface.start_local_unicast_server("text")?;

    let session = interface.establish_unicast("peer")?;
    for name in ["Optimus", "Prime", "Homer Simpson"] {
        let response = interface.unicast(&session, &name)?;
        assert_eq!(as_string(response).as_deref(), Some(name));
    }
    let response = interface.unicast(&session, &String::from("Albert Einstein"))?;
    assert_eq!(as_string(response).as_deref(), Some("Albert Einstein"));
    Ok(())
}

#[rstest]
fn test_wrong_message_type_fails_the_exchange(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 1)?;
    let session = harness.interface.establish_unicast("remote")?;

    let err = harness.interface.unicast(&session, &"forty two").unwrap_err();
    assert!(matches!(
        err,
        AppError::Communicator(CommunicatorError::UnsupportedMessage { .. })
    ));
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct Person {
    first_name: String,
    last_name: String,
}

struct FullNameServer;

impl UnicastServerHandler<ObjectFraming> for FullNameServer {
    fn communicate(&mut self, framing: &mut ObjectFraming) -> CommunicatorResult<bool> {
        let person: Person = framing.read_object()?;
        framing.write_object(&format!("{} {}", person.first_name, person.last_name))?;
        Ok(true)
    }
}

struct FullNameClient;

impl UnicastClientHandler<ObjectFraming> for FullNameClient {
    fn communicate(
        &mut self,
        framing: &mut ObjectFraming,
        message: &dyn NetworkMessage,
    ) -> CommunicatorResult<Option<Box<dyn NetworkMessage>>> {
        let person = message.downcast_ref::<Person>().ok_or_else(|| {
            CommunicatorError::UnsupportedMessage {
                name: "full-name-client".into(),
                message: message.message_type().into(),
            }
        })?;
        framing.write_object(person)?;
        let full_name: String = framing.read_object()?;
        Ok(Some(Box::new(full_name)))
    }
}

#[rstest]
fn test_object_framing_unicast(harness: Harness) -> AppResult<()> {
    harness.registry.register_unicast_server("full-name-server", || {
        Box::new(Framed::new(ObjectFraming::new("full-name-server"), FullNameServer))
    })?;
    harness.registry.register_unicast_client("full-name-client", || {
        Box::new(Framed::new(ObjectFraming::new("full-name-client"), FullNameClient))
    })?;

    let port = free_tcp_port();
    let interface = &harness.interface;
    interface.configure(LocalUnicastServer, "names", "full-name-server", "0.0.0.0", port, 1)?;
    interface.configure(RemoteUnicastServer, "names-peer", "full-name-client", "127.0.0.1", port, 1)?;
    interface.start_local_unicast_server("names")?;

    let session = interface.establish_unicast("names-peer")?;
    let person = Person {
        first_name: "Optimus".into(),
        last_name: "Prime".into(),
    };
    let response = interface.unicast(&session, &person)?;
    assert_eq!(as_string(response).as_deref(), Some("Optimus Prime"));
    Ok(())
}

#[rstest]
fn test_server_restarts_after_stop(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 1)?;
    let interface = &harness.interface;
    assert!(matches!(
        interface.start_local_unicast_server("echo"),
        Err(AppError::UnicastServerStarted(_))
    ));

    interface.stop_local_unicast_server("echo")?;
    interface.start_local_unicast_server("echo")?;
    assert!(interface.is_local_unicast_server_running("echo")?);

    let session = interface.establish_unicast("remote")?;
    assert_eq!(as_i32(interface.unicast(&session, &5i32)?), Some(5));
    Ok(())
}

#[rstest]
fn test_port_in_use_is_unable_to_bind(harness: Harness) -> AppResult<()> {
    let occupant = TcpListener::bind("0.0.0.0:0")?;
    let port = occupant.local_addr()?.port();
    harness
        .interface
        .configure(LocalUnicastServer, "echo", DATA_ECHO_SERVER, "0.0.0.0", port, 1)?;

    let err = harness.interface.start_local_unicast_server("echo").unwrap_err();
    assert!(matches!(err, AppError::UnableToBindServer { port: p, .. } if p == port));
    assert!(!harness.interface.is_local_unicast_server_running("echo")?);
    Ok(())
}

fn echo_request(stream: &mut TcpStream, value: i32) -> std::io::Result<i32> {
    stream.write_all(&value.to_be_bytes())?;
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply)?;
    Ok(i32::from_be_bytes(reply))
}

#[rstest]
fn test_pool_serves_max_threads_connections_at_a_time(harness: Harness) -> AppResult<()> {
    let port = data_echo_pair(&harness, 2)?;

    let mut connections = Vec::new();
    for _ in 0..3 {
        let stream = TcpStream::connect(("127.0.0.1", port))?;
        stream.set_read_timeout(Some(Duration::from_millis(300)))?;
        connections.push(stream);
    }
    assert_eq!(echo_request(&mut connections[0], 1)?, 1);
    assert_eq!(echo_request(&mut connections[1], 2)?, 2);

    // both workers are busy, the third connection waits in the queue
    let err = echo_request(&mut connections[2], 3).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut));
    assert_eq!(harness.interface.local_unicast_server_connections("echo")?, 3);

    // closing a served connection frees its worker for the queued one
    drop(connections.remove(0));
    let waiting = &mut connections[1];
    waiting.set_read_timeout(Some(WAIT))?;
    let mut reply = [0u8; 4];
    waiting.read_exact(&mut reply)?;
    assert_eq!(i32::from_be_bytes(reply), 3);
    Ok(())
}

#[rstest]
fn test_stop_closes_live_connections(harness: Harness) -> AppResult<()> {
    let port = data_echo_pair(&harness, 1)?;
    let mut idle = TcpStream::connect(("127.0.0.1", port))?;
    idle.set_read_timeout(Some(WAIT))?;
    assert_eq!(echo_request(&mut idle, 9)?, 9);

    harness.interface.stop_local_unicast_server("echo")?;
    assert_eq!(harness.interface.local_unicast_server_connections("echo")?, 0);

    // the worker noticed the stop and closed its side
    let mut byte = [0u8; 1];
    let closed = matches!(idle.read(&mut byte), Ok(0) | Err(_));
    assert!(closed);
    Ok(())
}

#[rstest]
fn test_multicast_rejects_oversize_message(harness: Harness) -> AppResult<()> {
    let listener = UdpSocket::bind("127.0.0.1:0")?;
    listener.set_read_timeout(Some(Duration::from_millis(300)))?;
    let port = listener.local_addr()?.port();
    let interface = &harness.interface;
    interface.configure(RemoteMulticastClient, "group", TEXT_MULTICAST_SENDER, "127.0.0.1", port, 1)?;
    let session = interface.establish_multicast("group")?;

    let oversize = "x".repeat(MULTICAST_PACKET_SIZE);
    let err = interface.multicast(&session, &oversize).unwrap_err();
    assert!(matches!(
        err,
        AppError::MessageTooLarge { limit: MULTICAST_PACKET_SIZE, size } if size == MULTICAST_PACKET_SIZE + 1
    ));
    let mut packet = [0u8; 1024];
    assert!(listener.recv_from(&mut packet).is_err());

    interface.multicast(&session, &"ping")?;
    let (size, _) = listener.recv_from(&mut packet)?;
    assert_eq!(&packet[..size], b"ping\n");
    Ok(())
}

#[rstest]
fn test_text_multicast_delivers_one_datagram(harness: Harness) -> AppResult<()> {
    let port = free_udp_port();
    let interface = &harness.interface;
    interface.configure(LocalMulticastClient, "listen", TEXT_MULTICAST_RECEIVER, "127.0.0.1", port, 1)?;
    interface.configure(RemoteMulticastClient, "announce", TEXT_MULTICAST_SENDER, "127.0.0.1", port, 1)?;
    interface.start_local_multicast_client("listen")?;
    assert!(interface.is_local_multicast_client_running("listen")?);
    assert!(matches!(
        interface.start_local_multicast_client("listen"),
        Err(AppError::MulticastClientStarted(_))
    ));

    let session = interface.establish_multicast("announce")?;
    interface.multicast(&session, &"ping")?;
    assert_eq!(wait_for_line(&harness.inbox).as_deref(), Some("ping"));
    thread::sleep(Duration::from_millis(100));
    assert!(harness.inbox.try_recv().is_err());

    interface.multicast(&session, &String::from("pong"))?;
    assert_eq!(wait_for_line(&harness.inbox).as_deref(), Some("pong"));

    interface.destroy_multicast(&session)?;
    assert!(matches!(
        interface.multicast(&session, &"ping"),
        Err(AppError::MulticastSessionNotFound(_))
    ));
    interface.stop_local_multicast_client("listen")?;
    assert!(!interface.is_local_multicast_client_running("listen")?);
    assert!(matches!(
        interface.stop_local_multicast_client("listen"),
        Err(AppError::MulticastClientNotStarted(_))
    ));
    Ok(())
}

#[rstest]
fn test_idle_sessions_are_evicted_after_timeout(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 1)?;
    let listener = UdpSocket::bind("127.0.0.1:0")?;
    let udp_port = listener.local_addr()?.port();
    let interface = &harness.interface;
    interface.configure(RemoteMulticastClient, "group", TEXT_MULTICAST_SENDER, "127.0.0.1", udp_port, 1)?;

    let unicast = interface.establish_unicast("remote")?;
    let multicast = interface.establish_multicast("group")?;
    let t0 = interface
        .session_last_access(&unicast)
        .max(interface.session_last_access(&multicast))
        .unwrap();
    let timeout = interface.settings().local_unicast_session_timeout();
    let epsilon = Duration::from_millis(1);

    assert_eq!(interface.evict_idle_sessions(t0 + timeout - epsilon), 0);
    assert!(interface.session_last_access(&unicast).is_some());

    assert_eq!(interface.evict_idle_sessions(t0 + timeout + epsilon), 2);
    assert!(interface.session_last_access(&unicast).is_none());
    assert!(interface.session_last_access(&multicast).is_none());
    assert!(matches!(
        interface.unicast(&unicast, &1i32),
        Err(AppError::UnicastSessionNotFound(_))
    ));
    Ok(())
}

#[rstest]
fn test_use_refreshes_last_access(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 1)?;
    let interface = &harness.interface;
    let session = interface.establish_unicast("remote")?;
    let created = interface.session_last_access(&session).unwrap();

    thread::sleep(Duration::from_millis(20));
    interface.unicast(&session, &1i32)?;
    let used = interface.session_last_access(&session).unwrap();
    assert!(used > created);

    let timeout = interface.settings().local_unicast_session_timeout();
    assert_eq!(interface.evict_idle_sessions(created + timeout + Duration::from_millis(10)), 0);
    Ok(())
}

#[rstest]
fn test_close_all_stops_everything(harness: Harness) -> AppResult<()> {
    data_echo_pair(&harness, 1)?;
    let port = free_udp_port();
    let interface = &harness.interface;
    interface.configure(LocalMulticastClient, "listen", TEXT_MULTICAST_RECEIVER, "127.0.0.1", port, 1)?;
    interface.start_local_multicast_client("listen")?;
    let session = interface.establish_unicast("remote")?;

    interface.close_all();
    assert!(!interface.is_local_unicast_server_running("echo")?);
    assert!(!interface.is_local_multicast_client_running("listen")?);
    assert!(interface.session_last_access(&session).is_none());

    // configurations survive and can be brought up again
    interface.start_local_unicast_server("echo")?;
    assert!(interface.is_local_unicast_server_running("echo")?);
    Ok(())
}

#[rstest]
fn test_session_ids_never_collide_across_configs(harness: Harness) -> AppResult<()> {
    let port = data_echo_pair(&harness, 1)?;
    let interface = &harness.interface;
    interface.configure(RemoteUnicastServer, "remote1", DATA_INT_CLIENT, "127.0.0.1", port, 1)?;

    // "remote1" with counter 1 and "remote" with counter 11 render the same text
    let first = interface.establish_unicast("remote1")?;
    let mut ids = HashSet::from([first.clone()]);
    for _ in 0..10 {
        ids.insert(interface.establish_unicast("remote")?);
    }
    assert_eq!(ids.len(), 11);
    assert_eq!(as_i32(interface.unicast(&first, &11i32)?), Some(11));
    Ok(())
}

#[rstest]
#[case::destroy(false)]
#[case::evict(true)]
fn test_closing_a_session_unblocks_its_exchange(#[case] evict: bool) -> AppResult<()> {
    let registry = Arc::new(CommunicatorRegistry::new());
    let _inbox = register_builtin_communicators(&registry)?;
    let interface = Arc::new(NetworkInterface::new(test_settings(), registry));
    // the kernel completes the handshake, nobody ever answers
    let silent_peer = TcpListener::bind("127.0.0.1:0")?;
    let port = silent_peer.local_addr()?.port();
    interface.configure(RemoteUnicastServer, "silent", DATA_INT_CLIENT, "127.0.0.1", port, 1)?;
    let session = interface.establish_unicast("silent")?;

    let (exchange_tx, exchange_rx) = mpsc::channel();
    let exchanging = interface.clone();
    let exchange_session = session.clone();
    thread::spawn(move || {
        let outcome = exchanging.unicast(&exchange_session, &42i32).map(as_i32);
        let _ = exchange_tx.send(outcome);
    });
    thread::sleep(Duration::from_millis(200));
    assert!(exchange_rx.try_recv().is_err());

    let (close_tx, close_rx) = mpsc::channel();
    let closing = interface.clone();
    let closing_session = session.clone();
    thread::spawn(move || {
        let closed = if evict {
            let timeout = closing.settings().local_unicast_session_timeout();
            closing.evict_idle_sessions(Instant::now() + timeout + Duration::from_secs(1)) == 1
        } else {
            closing.destroy_unicast(&closing_session).is_ok()
        };
        let _ = close_tx.send(closed);
    });

    assert!(close_rx.recv_timeout(WAIT).expect("closing the session blocked"));
    assert!(interface.session_last_access(&session).is_none());
    let outcome = exchange_rx.recv_timeout(WAIT).expect("exchange still blocked");
    assert!(outcome.is_err());
    Ok(())
}

#[rstest]
fn test_undecodable_datagram_stops_multicast_client(harness: Harness) -> AppResult<()> {
    let port = free_udp_port();
    let interface = &harness.interface;
    interface.configure(LocalMulticastClient, "listen", TEXT_MULTICAST_RECEIVER, "127.0.0.1", port, 1)?;
    interface.start_local_multicast_client("listen")?;

    let sender = UdpSocket::bind("127.0.0.1:0")?;
    sender.send_to(&[0xff, b'\n'], ("127.0.0.1", port))?;
    let mut stopped = false;
    for _ in 0..(WAIT.as_millis() / 10) {
        if !interface.is_local_multicast_client_running("listen")? {
            stopped = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(stopped);
    assert!(harness.inbox.try_recv().is_err());

    // the stopped client released its socket and can be started again
    interface.start_local_multicast_client("listen")?;
    assert!(interface.is_local_multicast_client_running("listen")?);
    sender.send_to(b"ping\n", ("127.0.0.1", port))?;
    assert_eq!(wait_for_line(&harness.inbox).as_deref(), Some("ping"));
    Ok(())
}

#[rstest]
fn test_multicast_client_bind_failure(harness: Harness) -> AppResult<()> {
    let interface = &harness.interface;
    let occupant = UdpSocket::bind("127.0.0.1:0")?;
    let occupied = occupant.local_addr()?.port();
    let free = free_udp_port();
    interface.configure(LocalMulticastClient, "occupied", TEXT_MULTICAST_RECEIVER, "127.0.0.1", occupied, 1)?;
    // documentation range, never assigned to a local interface
    interface.configure(LocalMulticastClient, "foreign", TEXT_MULTICAST_RECEIVER, "192.0.2.1", free, 1)?;

    for (name, port) in [("occupied", occupied), ("foreign", free)] {
        let err = interface.start_local_multicast_client(name).unwrap_err();
        assert!(matches!(err, AppError::UnableToBindClient { port: p, .. } if p == port));
        assert!(!interface.is_local_multicast_client_running(name)?);
    }
    Ok(())
}

/// Needs a host that routes multicast on its default interface.
#[rstest]
#[ignore]
fn test_real_multicast_group(harness: Harness) -> AppResult<()> {
    let port = free_udp_port();
    let interface = &harness.interface;
    interface.configure(LocalMulticastClient, "listen", TEXT_MULTICAST_RECEIVER, "239.255.0.1", port, 1)?;
    interface.configure(RemoteMulticastClient, "announce", TEXT_MULTICAST_SENDER, "239.255.0.1", port, 1)?;
    interface.start_local_multicast_client("listen")?;

    let session = interface.establish_multicast("announce")?;
    interface.multicast(&session, &"ping")?;
    assert_eq!(wait_for_line(&harness.inbox).as_deref(), Some("ping"));
    Ok(())
}
