//! Channels and their passcodes

use codec::{decrypt, encrypt, CodecError};

/// The public channel; tried last when sending
pub const PUBLIC_CHANNEL: &str = "*";

/// A named channel; an empty passcode means cleartext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub passcode: String,
}

/// The channels a node participates in, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTable {
    channels: Vec<Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel or replaces its passcode
    ///
    /// Passcodes must be ASCII.
    pub fn insert(&mut self, name: &str, passcode: &str) -> Result<(), CodecError> {
        if !passcode.is_ascii() {
            return Err(CodecError::NonAsciiPasscode);
        }
        match self.channels.iter_mut().find(|c| c.name == name) {
            Some(channel) => channel.passcode = passcode.to_string(),
            None => self.channels.push(Channel {
                name: name.to_string(),
                passcode: passcode.to_string(),
            }),
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Passcode of `name`, or `""` when unknown
    pub fn passcode(&self, name: &str) -> &str {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map_or("", |c| c.passcode.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Enciphers `text` for `channel`
    pub fn seal(&self, channel: &str, text: &str) -> Result<String, CodecError> {
        encrypt(text, self.passcode(channel))
    }

    /// Deciphers `text` that arrived on `channel`
    ///
    /// Unmarked text, or text on a channel without a passcode, is returned
    /// as is.
    pub fn open(&self, channel: &str, text: &str) -> Result<String, CodecError> {
        let passcode = self.passcode(channel);
        if passcode.is_empty() || !codec::is_encrypted(text) {
            return Ok(text.to_string());
        }
        decrypt(text, passcode)
    }
}

/// Orders channel names for a unicast attempt: public channel last
pub fn send_order<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut ordered: Vec<String> = names.into_iter().cloned().collect();
    ordered.sort_by_key(|name| name == PUBLIC_CHANNEL);
    ordered
}
