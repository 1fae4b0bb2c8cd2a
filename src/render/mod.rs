use crate::models::{Notice, NoticeKind, RankedResult};
use lazy_static::lazy_static;
use std::collections::HashMap;

pub const DEFAULT_ICON: &str = "🍦";
const BAR_WIDTH: usize = 20;

lazy_static! {
    static ref FLAVOR_ICONS: HashMap<&'static str, &'static str> = {
        let mut icons = HashMap::new();
        // Normal flavors
        icons.insert("Strawberry Buttermilk", "🍓");
        icons.insert("Sweet Cream & Blackberry Jam", "🫒");
        icons.insert("Mint Fudge Brownie", "🍃");
        icons.insert("Salted Caramel", "🍯");
        icons.insert("Salty Vanilla", "🍦");
        // Unusual flavors
        icons.insert("Spruce Tips", "🌲");
        icons.insert("Parmesan", "🧀");
        icons.insert("Lovage Ginger & Rum Raisin", "🌿");
        icons.insert("Sour Cherry Lambic", "🍒");
        icons.insert("Ylang Ylang with Clove & Honeycomb", "🌺");
        icons.insert("Tiramisu", "☕");
        icons.insert("Star Anise Black Pepper", "⭐");
        icons.insert("Orange-Szechuan", "🍊");
        icons
    };
}

pub fn flavor_icon(flavor: &str) -> &'static str {
    FLAVOR_ICONS.get(flavor).copied().unwrap_or(DEFAULT_ICON)
}

/// Medal for the podium, `#N` for everyone else. `position` is 1-based.
pub fn rank_badge(position: usize) -> String {
    match position {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("#{}", n),
    }
}

fn bar(percentage: u32) -> String {
    let filled = (percentage.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub const THANKS_HEADER: &str =
    "Thank you for voting! 🎉\nYour preferences have been recorded. Here are the current results:\n";

/// Renders one block per row: badge, icon and flavor, points, then the bar.
pub fn render_results(results: &[RankedResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        out.push_str("No votes have been recorded yet.\n");
        return out;
    }

    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {} {}  {} points ({}%)\n",
            rank_badge(i + 1),
            flavor_icon(&result.flavor),
            result.flavor,
            result.points,
            result.percentage
        ));
        out.push_str(&format!("     {}\n", bar(result.percentage)));
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    let label = match notice.kind {
        NoticeKind::Success => "✔",
        NoticeKind::Error => "✖",
        NoticeKind::Warning => "⚠",
        NoticeKind::Info => "ℹ",
    };
    format!("{} {}", label, notice.message)
}
