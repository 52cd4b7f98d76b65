// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Date placeholders in file names.
//!
//! Paths such as `/var/log/app-%Y-%m-%d.log` name a different file every day.
//! The supported placeholders are a subset of `strftime`:
//!
//! | token | meaning                     |
//! |-------|-----------------------------|
//! | `%Y`  | year, four digits           |
//! | `%y`  | year, two digits            |
//! | `%m`  | month, `01`-`12`            |
//! | `%d`  | day of month, `01`-`31`     |
//! | `%j`  | day of year, `001`-`366`    |
//! | `%H`  | hour, `00`-`23`             |
//! | `%b`  | abbreviated month name      |
//! | `%B`  | full month name             |
//! | `%a`  | abbreviated weekday name    |
//! | `%A`  | full weekday name           |
//! | `%%`  | a literal `%`               |
//!
//! Unknown tokens are kept verbatim.

use std::fmt::Write;
use std::sync::OnceLock;
use time::{OffsetDateTime, UtcOffset};

const TOKENS: &[char] = &['Y', 'y', 'm', 'd', 'j', 'H', 'b', 'B', 'a', 'A'];

/// Check whether `template` contains at least one date placeholder
pub fn has_date_placeholders(template: &str) -> bool {
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some(t) if TOKENS.contains(&t) => return true,
                _ => continue,
            }
        }
    }
    false
}

/// Resolve the date placeholders of `template` against `now`
pub fn resolve_templated_name(template: &str, now: OffsetDateTime) -> String {
    let mut resolved = String::with_capacity(template.len() + 8);
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            resolved.push(c);
            continue;
        }

        // Writing to a String cannot fail
        let _ = match chars.next() {
            Some('Y') => write!(resolved, "{:04}", now.year()),
            Some('y') => write!(resolved, "{:02}", now.year().rem_euclid(100)),
            Some('m') => write!(resolved, "{:02}", u8::from(now.month())),
            Some('d') => write!(resolved, "{:02}", now.day()),
            Some('j') => write!(resolved, "{:03}", now.ordinal()),
            Some('H') => write!(resolved, "{:02}", now.hour()),
            Some('b') => write!(resolved, "{:.3}", now.month().to_string()),
            Some('B') => write!(resolved, "{}", now.month()),
            Some('a') => write!(resolved, "{:.3}", now.weekday().to_string()),
            Some('A') => write!(resolved, "{}", now.weekday()),
            Some('%') => write!(resolved, "%"),
            Some(other) => write!(resolved, "%{other}"),
            None => write!(resolved, "%"),
        };
    }

    resolved
}

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Determine the local UTC offset used by [local_now].
///
/// Call this before spawning threads. Once a process is multi-threaded the
/// offset may be indeterminable, UTC is used in that case.
pub fn init_local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Current local time
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(init_local_offset())
}
