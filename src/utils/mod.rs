/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    if seconds < 10.0 {
        return format!("{:.1}s", seconds.max(0.0));
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Normalize a language name or locale to the short code translation providers expect
pub fn normalize_language_code(lang: &str) -> String {
    let lowered = lang.trim().to_lowercase();

    let normalized = match lowered.as_str() {
        "ar" | "ar-sa" | "ar-eg" | "arabic" => "ar",
        "en" | "en-us" | "en-gb" | "english" => "en",
        "es" | "es-es" | "es-mx" | "spanish" => "es",
        "fr" | "fr-fr" | "french" => "fr",
        "de" | "de-de" | "german" => "de",
        "it" | "it-it" | "italian" => "it",
        "pt" | "pt-br" | "pt-pt" | "portuguese" => "pt",
        "ja" | "ja-jp" | "japanese" => "ja",
        "ko" | "ko-kr" | "korean" => "ko",
        "zh" | "zh-cn" | "chinese" => "zh",
        "hi" | "hi-in" | "hindi" => "hi",
        "ru" | "ru-ru" | "russian" => "ru",
        "tr" | "tr-tr" | "turkish" => "tr",
        // Codes the provider distinguishes by region are kept as given
        _ => return lang.trim().to_string(),
    };

    normalized.to_string()
}

/// External tools the yt-dlp extractor relies on
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path, "--version").await {
        missing.push(format!("{} - required for audio extraction", yt_dlp_path));
    }

    // yt-dlp shells out to ffmpeg for the mp3 conversion
    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for audio conversion".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
