//! Device injection script generation
//!
//! The browser-side synthesis script ships as an embedded template; the
//! port marker is substituted at generation time, the rest is static text.

use rust_embed::Embed;

/// Embedded script template
#[derive(Embed)]
#[folder = "assets"]
struct Assets;

/// Literal marker replaced by the configured port number
pub const PORT_MARKER: &str = "{{PORT}}";

/// Marker element id the script drops into the page; a present marker
/// makes re-injection a no-op
pub const INJECTED_MARKER_ID: &str = "synthcam-injected";

/// Global flag the script sets once the audio track is attached
pub const AUDIO_READY_FLAG: &str = "__synthcamAudioReady";

/// Render the injection script for the given server port
pub fn injection_script(port: u16) -> String {
    let asset = Assets::get("inject.js").expect("inject.js embedded at build time");
    let template = String::from_utf8_lossy(&asset.data);
    template.replace(PORT_MARKER, &port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_marker_is_substituted() {
        let script = injection_script(5443);
        assert!(script.contains("https://localhost:5443"));
        assert!(!script.contains(PORT_MARKER));
    }

    #[test]
    fn test_script_contract_markers() {
        let script = injection_script(5000);
        // Idempotency guard and readiness flag
        assert!(script.contains(INJECTED_MARKER_ID));
        assert!(script.contains(AUDIO_READY_FLAG));
        // Device-acquisition override and endpoint paths
        assert!(script.contains("navigator.mediaDevices.getUserMedia"));
        assert!(script.contains("/video_stream"));
        assert!(script.contains("/audio_file"));
        // The rendering surface is hidden from the page
        assert!(script.contains("canvas.style.display = 'none'"));
    }
}
