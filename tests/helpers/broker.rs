//! Minimal MQTT 3.1.1 broker for driving the bridge over a real socket
//!
//! Serves one client at a time, records every packet it understands and
//! answers CONNECT, SUBSCRIBE and PINGREQ.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;

pub const CONNACK_ACCEPTED: u8 = 0;
pub const CONNACK_NOT_AUTHORIZED: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Connect,
    Subscribe(Vec<String>),
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    PingReq,
    Disconnect,
}

type Writer = Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>;

pub struct FakeBroker {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
    writer: Writer,
    task: JoinHandle<()>,
}

impl FakeBroker {
    /// Listen on an ephemeral port and answer every CONNECT with `return_code`
    pub async fn start(return_code: u8) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let writer: Writer = Arc::new(tokio::sync::Mutex::new(None));

        let task = tokio::spawn(accept_loop(
            listener,
            return_code,
            received.clone(),
            writer.clone(),
        ));

        Self {
            addr,
            received,
            writer,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.received()
            .iter()
            .filter(|packet| **packet == Received::Connect)
            .count()
    }

    /// Payloads and retain flags published to `topic`, oldest first
    pub fn published_to(&self, topic: &str) -> Vec<(String, bool)> {
        self.received()
            .into_iter()
            .filter_map(|packet| match packet {
                Received::Publish {
                    topic: t,
                    payload,
                    retain,
                } if t == topic => Some((payload, retain)),
                _ => None,
            })
            .collect()
    }

    /// Deliver a QoS 0 publish to the connected client
    pub async fn send_publish(&self, topic: &str, payload: &str) {
        let mut body = Vec::new();
        body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(payload.as_bytes());

        let mut packet = vec![0x30];
        packet.extend(encode_remaining_length(body.len()));
        packet.extend(body);

        write(&self.writer, &packet).await;
    }

    /// Poll the received packets until `done` holds or `timeout` elapses
    pub async fn wait_until(
        &self,
        timeout: Duration,
        done: impl Fn(&[Received]) -> bool,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if done(&self.received()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    return_code: u8,
    received: Arc<Mutex<Vec<Received>>>,
    writer: Writer,
) {
    while let Ok((stream, _)) = listener.accept().await {
        let (mut reader, write_half) = stream.into_split();
        *writer.lock().await = Some(write_half);

        serve(&mut reader, return_code, &received, &writer).await;

        *writer.lock().await = None;
    }
}

async fn serve(
    reader: &mut OwnedReadHalf,
    return_code: u8,
    received: &Mutex<Vec<Received>>,
    writer: &Writer,
) {
    while let Some((header, body)) = read_packet(reader).await {
        match header >> 4 {
            1 => {
                received.lock().unwrap().push(Received::Connect);
                write(writer, &[0x20, 0x02, 0x00, return_code]).await;
                if return_code != CONNACK_ACCEPTED {
                    return;
                }
            }
            3 => {
                let retain = header & 0x01 == 0x01;
                let qos = (header >> 1) & 0x03;
                let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).into_owned();
                let mut offset = 2 + topic_len;
                if qos > 0 {
                    offset += 2;
                }
                let payload = String::from_utf8_lossy(&body[offset..]).into_owned();
                received.lock().unwrap().push(Received::Publish {
                    topic,
                    payload,
                    retain,
                });
            }
            8 => {
                let mut filters = Vec::new();
                let mut offset = 2;
                while offset + 2 <= body.len() {
                    let len = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
                    offset += 2;
                    filters.push(String::from_utf8_lossy(&body[offset..offset + len]).into_owned());
                    // Skip the requested QoS byte
                    offset += len + 1;
                }

                let mut suback = vec![0x90, 2 + filters.len() as u8, body[0], body[1]];
                suback.extend(std::iter::repeat_n(0x00, filters.len()));
                received.lock().unwrap().push(Received::Subscribe(filters));
                write(writer, &suback).await;
            }
            12 => {
                received.lock().unwrap().push(Received::PingReq);
                write(writer, &[0xD0, 0x00]).await;
            }
            14 => {
                received.lock().unwrap().push(Received::Disconnect);
                return;
            }
            _ => {}
        }
    }
}

async fn read_packet(reader: &mut OwnedReadHalf) -> Option<(u8, Vec<u8>)> {
    let header = reader.read_u8().await.ok()?;

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8().await.ok()?;
        remaining |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 21 {
            return None;
        }
    }

    let mut body = vec![0; remaining];
    reader.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode_remaining_length(mut len: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if len == 0 {
            return bytes;
        }
    }
}

async fn write(writer: &Writer, bytes: &[u8]) {
    if let Some(stream) = writer.lock().await.as_mut() {
        let _ = stream.write_all(bytes).await;
    }
}
