//! Engine configuration generation
//!
//! Each station runs its own engine process with a generated config: control
//! port and stream port derived from the station id, all paths scoped under
//! the station's directory.

use std::path::Path;

/// Parameters for one station's engine config
pub struct EngineConfigParams<'a> {
    pub station_name: &'a str,
    pub bind_address: &'a str,
    pub port: u16,
    pub stream_port: u16,
    pub queue_dir: &'a Path,
    pub pid_file: &'a Path,
    pub db_file: &'a Path,
    pub sticker_file: &'a Path,
    pub log_file: &'a Path,
}

/// Render the engine config file contents
pub fn render(params: &EngineConfigParams<'_>) -> String {
    format!(
        r#"# Automatically generated. Do not edit.

port                    "{port}"
bind_to_address         "{address}"
music_directory         "{queue_dir}"
pid_file                "{pid_file}"
db_file                 "{db_file}"
sticker_file            "{sticker_file}"
log_file                "{log_file}"
max_connections         "30"

audio_output {{
    enabled             "yes"
    always_on           "yes"
    type                "httpd"
    name                "Crewcast: {station_name}"
    encoder             "lame"
    port                "{stream_port}"
    bitrate             "128"
    format              "44100:16:2"
}}
"#,
        port = params.port,
        address = params.bind_address,
        queue_dir = params.queue_dir.display(),
        pid_file = params.pid_file.display(),
        db_file = params.db_file.display(),
        sticker_file = params.sticker_file.display(),
        log_file = params.log_file.display(),
        station_name = params.station_name,
        stream_port = params.stream_port,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_includes_scoped_paths() {
        let queue_dir = PathBuf::from("/data/stations/3/queue");
        let pid = PathBuf::from("/data/stations/3/engine.pid");
        let db = PathBuf::from("/data/stations/3/engine.db");
        let stickers = PathBuf::from("/data/stations/3/engine.stickers");
        let log = PathBuf::from("/data/stations/3/engine.log");

        let rendered = render(&EngineConfigParams {
            station_name: "Main Station",
            bind_address: "localhost",
            port: 6603,
            stream_port: 8003,
            queue_dir: &queue_dir,
            pid_file: &pid,
            db_file: &db,
            sticker_file: &stickers,
            log_file: &log,
        });

        assert!(rendered.contains(r#"port                    "6603""#));
        assert!(rendered.contains("/data/stations/3/queue"));
        assert!(rendered.contains(r#"port                "8003""#));
        assert!(rendered.contains("Crewcast: Main Station"));
    }
}
