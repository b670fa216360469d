//! Redis backend tests.
//!
//! Runs `KvStore` against a `MockRedisServer` that keeps strings and hashes
//! in memory and answers the RESP commands the store issues, over real TCP
//! connections.
//!
//! The test stack: `KvStore` → `RedisStore` → `ConnectionManager` → TCP → `MockRedisServer`

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use distq_core::{StoreBackend, StoreConfig};
use distq_state::{KvStore, StateError};

// ── MockRedisServer ──────────────────────────────────────────────────

enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
}

type Db = Arc<Mutex<HashMap<String, Entry>>>;

/// A TCP server that speaks enough RESP for the store:
/// PING, SET/GET, HSET/HGET/HGETALL/HDEL and EXISTS. CLIENT and SELECT
/// (sent during connection setup) answer +OK.
struct MockRedisServer {
    addr: SocketAddr,
}

impl MockRedisServer {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");
        let db: Db = Arc::default();

        std::thread::spawn(move || {
            while let Ok((mut stream, _)) = listener.accept() {
                let db = db.clone();
                std::thread::spawn(move || handle_connection(&mut stream, &db));
            }
        });

        std::thread::sleep(Duration::from_millis(10));
        Self { addr }
    }

    /// Start a mock server that closes connections immediately after accept.
    fn start_close_immediately() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");

        std::thread::spawn(move || {
            while let Ok((stream, _)) = listener.accept() {
                drop(stream);
            }
        });

        std::thread::sleep(Duration::from_millis(10));
        Self { addr }
    }

    fn config(&self) -> StoreConfig {
        redis_config(format!("redis://{}/0", self.addr))
    }
}

fn redis_config(redis_url: String) -> StoreConfig {
    StoreConfig {
        backend: StoreBackend::Redis,
        redis_url,
        ..StoreConfig::default()
    }
}

fn handle_connection(stream: &mut TcpStream, db: &Db) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => pending.extend_from_slice(&buf[..n]),
        }
        while let Some((args, used)) = parse_command(&pending) {
            pending.drain(..used);
            if stream.write_all(&execute(&args, db)).is_err() {
                return;
            }
        }
    }
}

/// Parse `<prefix><n>\r\n` at `pos`. Returns `n` and the offset past the line.
fn parse_header(buf: &[u8], pos: usize, prefix: u8) -> Option<(usize, usize)> {
    if *buf.get(pos)? != prefix {
        return None;
    }
    let line_end = pos + buf[pos..].windows(2).position(|w| w == b"\r\n")?;
    let n = std::str::from_utf8(&buf[pos + 1..line_end]).ok()?.parse().ok()?;
    Some((n, line_end + 2))
}

/// One complete array-of-bulk-strings command, or `None` if more bytes are needed.
fn parse_command(buf: &[u8]) -> Option<(Vec<String>, usize)> {
    let (count, mut pos) = parse_header(buf, 0, b'*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let (len, start) = parse_header(buf, pos, b'$')?;
        let end = start + len;
        if buf.len() < end + 2 {
            return None;
        }
        args.push(String::from_utf8_lossy(&buf[start..end]).into_owned());
        pos = end + 2;
    }
    Some((args, pos))
}

fn bulk(value: &str) -> Vec<u8> {
    format!("${}\r\n{value}\r\n", value.len()).into_bytes()
}

fn int(n: usize) -> Vec<u8> {
    format!(":{n}\r\n").into_bytes()
}

const NIL: &[u8] = b"$-1\r\n";
const OK: &[u8] = b"+OK\r\n";

fn execute(args: &[String], db: &Db) -> Vec<u8> {
    let mut db = db.lock().expect("mock db lock");
    let Some((cmd, rest)) = args.split_first() else {
        return b"-ERR empty command\r\n".to_vec();
    };
    let cmd = cmd.to_ascii_uppercase();

    match (cmd.as_str(), rest) {
        ("PING", _) => b"+PONG\r\n".to_vec(),
        ("CLIENT" | "SELECT", _) => OK.to_vec(),
        ("SET", [key, value]) => {
            db.insert(key.clone(), Entry::Str(value.clone()));
            OK.to_vec()
        }
        ("GET", [key]) => match db.get(key) {
            Some(Entry::Str(value)) => bulk(value),
            _ => NIL.to_vec(),
        },
        ("HSET", [key, field, value]) => {
            let entry = db
                .entry(key.clone())
                .or_insert_with(|| Entry::Hash(HashMap::new()));
            match entry {
                Entry::Hash(hash) => int(usize::from(hash.insert(field.clone(), value.clone()).is_none())),
                Entry::Str(_) => b"-WRONGTYPE\r\n".to_vec(),
            }
        }
        ("HGET", [key, field]) => match db.get(key) {
            Some(Entry::Hash(hash)) => hash.get(field).map_or(NIL.to_vec(), |v| bulk(v)),
            _ => NIL.to_vec(),
        },
        ("HGETALL", [key]) => match db.get(key) {
            Some(Entry::Hash(hash)) => {
                let mut out = format!("*{}\r\n", hash.len() * 2).into_bytes();
                for (field, value) in hash {
                    out.extend(bulk(field));
                    out.extend(bulk(value));
                }
                out
            }
            _ => b"*0\r\n".to_vec(),
        },
        ("HDEL", [key, field]) => {
            let (removed, now_empty) = match db.get_mut(key) {
                Some(Entry::Hash(hash)) => (hash.remove(field).is_some(), hash.is_empty()),
                _ => (false, false),
            };
            // Redis drops a hash once its last field is gone.
            if now_empty {
                db.remove(key);
            }
            int(usize::from(removed))
        }
        ("EXISTS", [key]) => int(usize::from(db.contains_key(key))),
        _ => format!("-ERR unknown command '{cmd}'\r\n").into_bytes(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_pings_the_server() {
    let server = MockRedisServer::start();
    let store = KvStore::connect(&server.config()).await.unwrap();
    assert_eq!(store.backend(), StoreBackend::Redis);
    store.ping().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_is_a_connect_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let err = KvStore::connect(&redis_config(format!("redis://{addr}/0")))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StateError::Connect(_)), "got {err:?}");
}

#[tokio::test]
async fn server_that_hangs_up_is_a_connect_error() {
    let server = MockRedisServer::start_close_immediately();
    let err = KvStore::connect(&server.config()).await.err().unwrap();
    assert!(matches!(err, StateError::Connect(_)), "got {err:?}");
}

#[tokio::test]
async fn strings_round_trip() {
    let server = MockRedisServer::start();
    let store = KvStore::connect(&server.config()).await.unwrap();

    assert!(store.get("uuid:abc-1").await.unwrap().is_none());
    store.set("uuid:abc-1", "K1").await.unwrap();
    assert_eq!(store.get("uuid:abc-1").await.unwrap().as_deref(), Some("K1"));
    assert!(store.exists("uuid:abc-1").await.unwrap());
}

#[tokio::test]
async fn hash_operations() {
    let server = MockRedisServer::start();
    let store = KvStore::connect(&server.config()).await.unwrap();

    store.hset("nodekey:K1", "UUID", "abc-1").await.unwrap();
    store.hset("nodekey:K1", "Platform", "darwin(10.15.7)").await.unwrap();
    assert!(store.exists("nodekey:K1").await.unwrap());

    let host = store.hgetall("nodekey:K1").await.unwrap();
    assert_eq!(host.len(), 2);
    assert_eq!(host["Platform"], "darwin(10.15.7)");
    assert_eq!(store.hget("nodekey:K1", "UUID").await.unwrap().as_deref(), Some("abc-1"));
    assert!(store.hget("nodekey:K1", "nope").await.unwrap().is_none());

    assert!(store.hdel("nodekey:K1", "UUID").await.unwrap());
    assert!(!store.hdel("nodekey:K1", "UUID").await.unwrap());
    assert!(store.hdel("nodekey:K1", "Platform").await.unwrap());
    assert!(!store.exists("nodekey:K1").await.unwrap());
    assert!(store.hgetall("nodekey:K1").await.unwrap().is_empty());
}

#[tokio::test]
async fn handles_share_one_server() {
    let server = MockRedisServer::start();
    let store = KvStore::connect(&server.config()).await.unwrap();
    let clone = store.clone();

    store.hset("queries:pending", "Q1", "SELECT 1").await.unwrap();
    assert_eq!(
        clone.hget("queries:pending", "Q1").await.unwrap().as_deref(),
        Some("SELECT 1")
    );
}
