// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Success,
    Info,
    Warning,
    Danger,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusStyle {
    pub tone: Tone,
    pub icon: &'static str,
    pub label: String,
}

/// Display metadata for any status string the backend emits. Matching is
/// case-insensitive and treats spaces and dashes like underscores; unknown
/// values render neutral with a humanized label.
pub fn status_style(raw: &str) -> StatusStyle {
    let key = normalize(raw);
    let (tone, icon) = match key.as_str() {
        // transactions
        "delivered" => (Tone::Success, "✓"),
        "shipped" => (Tone::Info, "→"),
        "processing" => (Tone::Info, "⟳"),
        "confirmed" => (Tone::Info, "●"),
        "pending" => (Tone::Warning, "…"),
        "cancelled" | "canceled" => (Tone::Danger, "✕"),

        // inventory
        "in_stock" => (Tone::Success, "●"),
        "low_stock" => (Tone::Warning, "▼"),
        "reorder_needed" => (Tone::Warning, "!"),
        "out_of_stock" => (Tone::Danger, "✕"),
        "resolved" => (Tone::Success, "✓"),

        // forecasts
        "active" => (Tone::Info, "●"),
        "expired" => (Tone::Neutral, "○"),

        // orders
        "approved" => (Tone::Info, "✓"),
        "ordered" => (Tone::Info, "→"),
        "received" => (Tone::Success, "✓"),

        // agent
        "healthy" | "success" | "ok" => (Tone::Success, "●"),
        "error" | "failed" | "unhealthy" => (Tone::Danger, "✕"),

        _ => (Tone::Neutral, "·"),
    };
    StatusStyle {
        tone,
        icon,
        label: humanize(&key),
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (index, word) in key.split('_').filter(|word| !word.is_empty()).enumerate() {
        if index > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Tone, status_style};
    use crate::{InventoryStatus, OrderStatus, TransactionStatus};

    #[test]
    fn every_known_status_has_a_non_neutral_tone() {
        for status in TransactionStatus::ALL {
            assert_ne!(status_style(status.as_str()).tone, Tone::Neutral, "{status:?}");
        }
        for status in InventoryStatus::ALL {
            assert_ne!(status_style(status.as_str()).tone, Tone::Neutral, "{status:?}");
        }
        assert_eq!(status_style(OrderStatus::Received.as_str()).tone, Tone::Success);
    }

    #[test]
    fn matching_ignores_case_and_separators() {
        let style = status_style("Out-Of Stock");
        assert_eq!(style.tone, Tone::Danger);
        assert_eq!(style.label, "Out Of Stock");
        assert_eq!(status_style("reorder_needed").label, "Reorder Needed");
    }

    #[test]
    fn unknown_status_is_neutral() {
        let style = status_style("on_hold");
        assert_eq!(style.tone, Tone::Neutral);
        assert_eq!(style.label, "On Hold");
        assert_eq!(status_style("").label, "");
    }
}
