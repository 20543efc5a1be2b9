//! Terminal card for the result slots.

use bookbridge_core::ReviewOutcome;
use bookbridge_host::Slots;

/// Print the slots as a card: header, status line, rating section, reviews.
pub fn print_slots(slots: &Slots) {
    print!("{}", render_slots(slots));
}

pub fn render_slots(slots: &Slots) -> String {
    let mut out = String::new();
    let header = slots.found.as_deref().unwrap_or("Bookbridge");
    out.push_str(&format!("=== {header} ===\n"));
    if let Some(status) = slots.status {
        out.push_str(&format!("{status}\n"));
    }
    out.push('\n');

    let rows = [
        ("score", slots.score.as_deref()),
        ("votes", slots.votes.as_deref()),
        ("link", slots.link.as_deref()),
    ];
    if rows.iter().any(|(_, value)| value.is_some()) {
        out.push_str("Douban\n");
        for (name, value) in rows {
            if let Some(value) = value {
                out.push_str(&format!("  {name:<26} {value}\n"));
            }
        }
        out.push('\n');
    }

    match &slots.reviews {
        None => {}
        Some(ReviewOutcome::Unavailable) => out.push_str("Reviews\n  (unavailable)\n\n"),
        Some(ReviewOutcome::Reviews(reviews)) if reviews.is_empty() => {
            out.push_str("Reviews\n  (none)\n\n")
        }
        Some(ReviewOutcome::Reviews(reviews)) => {
            out.push_str("Reviews\n");
            for review in reviews {
                out.push_str(&format!("  {review}\n"));
            }
            out.push('\n');
        }
    }
    out
}
