//! Message sockets and routing
//!
//! A socket is a named FIFO shared between whoever posts into it and the
//! collection that drains it. The router maps socket name hashes to sockets
//! so a message can be addressed purely by `Url`.

use crate::hash::hash_str;
use crate::property::PropertySet;
use glam::{Quat, Vec3};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

pub static SET_PARENT: Lazy<u64> = Lazy::new(|| hash_str("set_parent"));
pub static REQUEST_TRANSFORM: Lazy<u64> = Lazy::new(|| hash_str("request_transform"));
pub static TRANSFORM_RESPONSE: Lazy<u64> = Lazy::new(|| hash_str("transform_response"));

/// Address of a socket, an instance within it and optionally one of its components.
///
/// A zero `path` or `fragment` means "not set".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Url {
    pub socket: u64,
    pub path: u64,
    pub fragment: u64,
}

impl Url {
    pub fn new(socket: u64, path: u64, fragment: u64) -> Self {
        Self {
            socket,
            path,
            fragment,
        }
    }

    pub fn instance(socket: u64, path: u64) -> Self {
        Self::new(socket, path, 0)
    }

    pub fn with_fragment(self, fragment: u64) -> Self {
        Self { fragment, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformResponse {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub world_position: Vec3,
    pub world_rotation: Quat,
    pub world_scale: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Empty,
    Bytes(Vec<u8>),
    Properties(PropertySet),
    /// Reparent the receiver; `parent` is an instance identifier, `None` detaches.
    SetParent {
        parent: Option<u64>,
        keep_world_transform: bool,
    },
    RequestTransform,
    TransformResponse(TransformResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: Url,
    pub receiver: Url,
    pub id: u64,
    pub payload: MessagePayload,
}

impl Message {
    pub fn new(sender: Url, receiver: Url, id: u64, payload: MessagePayload) -> Self {
        Self {
            sender,
            receiver,
            id,
            payload,
        }
    }

    pub fn set_parent(
        sender: Url,
        receiver: Url,
        parent: Option<u64>,
        keep_world_transform: bool,
    ) -> Self {
        Self::new(
            sender,
            receiver,
            *SET_PARENT,
            MessagePayload::SetParent {
                parent,
                keep_world_transform,
            },
        )
    }

    pub fn request_transform(sender: Url, receiver: Url) -> Self {
        Self::new(
            sender,
            receiver,
            *REQUEST_TRANSFORM,
            MessagePayload::RequestTransform,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("invalid socket name '{name}'")]
    InvalidSocketName { name: String },

    #[error("socket '{name}' already exists")]
    SocketExists { name: String },

    #[error("socket {socket:#018x} not found")]
    SocketNotFound { socket: u64 },
}

/// Named FIFO of messages. Clones share the same queue.
#[derive(Clone)]
pub struct MessageSocket {
    name: Arc<str>,
    name_hash: u64,
    queue: Arc<Mutex<VecDeque<Message>>>,
}

impl MessageSocket {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            name_hash: hash_str(name),
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    pub fn post(&self, message: Message) {
        self.queue.lock().push_back(message);
    }

    pub fn has_messages(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Take everything queued so far. Messages posted while the caller
    /// processes the batch land in the next one.
    pub fn take_pending(&self) -> VecDeque<Message> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

impl std::fmt::Debug for MessageSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSocket")
            .field("name", &self.name)
            .field("pending", &self.len())
            .finish()
    }
}

/// Socket directory shared by the engine and every collection.
#[derive(Clone, Default)]
pub struct MessageRouter {
    sockets: Arc<RwLock<HashMap<u64, MessageSocket>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_socket(&self, name: &str) -> Result<MessageSocket, MessageError> {
        if name.is_empty() || name.contains(&['#', ':', '/'][..]) {
            return Err(MessageError::InvalidSocketName {
                name: name.to_string(),
            });
        }
        let socket = MessageSocket::new(name);
        let mut sockets = self.sockets.write();
        if sockets.contains_key(&socket.name_hash) {
            return Err(MessageError::SocketExists {
                name: name.to_string(),
            });
        }
        sockets.insert(socket.name_hash, socket.clone());
        Ok(socket)
    }

    /// Remove a socket, dropping whatever is still queued in it.
    pub fn delete_socket(&self, name_hash: u64) -> Option<MessageSocket> {
        let socket = self.sockets.write().remove(&name_hash)?;
        socket.clear();
        Some(socket)
    }

    pub fn socket(&self, name_hash: u64) -> Option<MessageSocket> {
        self.sockets.read().get(&name_hash).cloned()
    }

    pub fn post(&self, message: Message) -> Result<(), MessageError> {
        let socket = self
            .socket(message.receiver.socket)
            .ok_or(MessageError::SocketNotFound {
                socket: message.receiver.socket,
            })?;
        socket.post(message);
        Ok(())
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.read().len()
    }
}
