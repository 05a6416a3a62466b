//! Scoped engine protocol connection
//!
//! The engine speaks an MPD-compatible line protocol: a greeting on
//! connect, one command per request, `key: value` response lines terminated
//! by `OK`, errors reported as a single `ACK` line. Connections are opened
//! for one command and closed immediately; the only call that deliberately
//! parks on an open connection is `idle`, which is the engine's own
//! blocking-wait primitive.

use crate::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::trace;

/// One short-lived engine connection
pub struct EngineConnection {
    reader: BufReader<TcpStream>,
}

impl EngineConnection {
    /// Connect and consume the greeting line
    pub async fn open(addr: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((addr, port))
            .await
            .map_err(|e| Error::EngineConnection(e.to_string()))?;
        let mut reader = BufReader::new(stream);

        let mut greeting = String::new();
        reader
            .read_line(&mut greeting)
            .await
            .map_err(|e| Error::EngineConnection(e.to_string()))?;
        if !greeting.starts_with("OK") {
            return Err(Error::EngineConnection(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }

        Ok(Self { reader })
    }

    /// Send one command and collect the `key: value` response pairs.
    ///
    /// Blocks until the engine replies, which for `idle` means until the
    /// watched subsystem changes.
    pub async fn command(&mut self, command: &str, args: &[&str]) -> Result<Vec<(String, String)>> {
        let line = render_command(command, args);
        trace!("engine <- {}", line);

        self.reader
            .get_mut()
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| Error::EngineConnection(e.to_string()))?;

        let mut pairs = Vec::new();
        loop {
            let mut response = String::new();
            let n = self
                .reader
                .read_line(&mut response)
                .await
                .map_err(|e| Error::EngineConnection(e.to_string()))?;
            if n == 0 {
                return Err(Error::EngineConnection("connection closed".into()));
            }

            let response = response.trim_end();
            if response == "OK" {
                return Ok(pairs);
            }
            if let Some(ack) = response.strip_prefix("ACK ") {
                return Err(Error::EngineCommand(ack.to_string()));
            }
            if let Some((key, value)) = response.split_once(": ") {
                pairs.push((key.to_string(), value.to_string()));
            }
        }
    }

    /// Close the connection, swallowing protocol errors on the way out
    pub async fn close(mut self) {
        let _ = self.reader.get_mut().write_all(b"close\n").await;
        let _ = self.reader.get_mut().shutdown().await;
    }
}

/// Quote arguments the way the protocol expects
fn render_command(command: &str, args: &[&str]) -> String {
    let mut line = String::from(command);
    for arg in args {
        let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
        line.push_str(&format!(" \"{escaped}\""));
    }
    line
}

/// Collect the values of one key out of a pair list
pub fn values_of(pairs: &[(String, String)], key: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .collect()
}

/// First value of one key, case-sensitive
pub fn first_of<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command_quotes_args() {
        assert_eq!(render_command("play", &[]), "play");
        assert_eq!(
            render_command("add", &["3-some song.mp3"]),
            r#"add "3-some song.mp3""#
        );
        assert_eq!(
            render_command("add", &[r#"a"b\c"#]),
            r#"add "a\"b\\c""#
        );
    }

    #[test]
    fn test_pair_helpers() {
        let pairs = vec![
            ("file".to_string(), "one.mp3".to_string()),
            ("Artist".to_string(), "Spoon".to_string()),
            ("file".to_string(), "two.mp3".to_string()),
        ];
        assert_eq!(values_of(&pairs, "file"), vec!["one.mp3", "two.mp3"]);
        assert_eq!(first_of(&pairs, "Artist"), Some("Spoon"));
        assert_eq!(first_of(&pairs, "Album"), None);
    }
}
