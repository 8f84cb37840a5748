// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The safety catch.
//
// Physical printing needs two independent switches: the strategy's own flag
// and the deployment's `print_safety_catch` option. Anything missing or
// unreadable keeps the catch engaged.

use std::sync::Arc;

use tracing::info;

use printcatch_core::config::{ConfigSource, PRINT_SAFETY_CATCH, STRATEGY_SECTION};
use printcatch_core::types::Strategy;

/// Allow/deny decision for physical printing.
#[derive(Clone)]
pub struct SafetyCatch {
    config: Arc<dyn ConfigSource>,
}

impl SafetyCatch {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self { config }
    }

    /// Whether a job using `strategy` may reach a printer.
    ///
    /// True only when the strategy flag and the process flag are both true,
    /// and the strategy's extra safety option (if it names one) is true too.
    /// A missing strategy denies.
    pub fn is_printing_allowed(&self, strategy: Option<&Strategy>) -> bool {
        let Some(strategy) = strategy else {
            info!("no print strategy in effect, printing disabled");
            return false;
        };

        if !strategy.safety_catch_enabled {
            info!(strategy = %strategy.name, "strategy safety catch not enabled, printing disabled");
            return false;
        }

        if !self.config.get_bool(PRINT_SAFETY_CATCH) {
            info!(
                strategy = %strategy.name,
                "printing disabled, enable by configuring {PRINT_SAFETY_CATCH}"
            );
            return false;
        }

        if let Some(option) = strategy.safety_option.as_deref() {
            let key = safety_option_key(option);
            if !self.config.get_bool(&key) {
                info!(
                    strategy = %strategy.name,
                    "printing disabled, enable by configuring safety option {key}"
                );
                return false;
            }
        }

        true
    }
}

/// Full configuration key for a strategy safety option.
///
/// `section.key` is used as given; a bare `key` lives in the strategy section.
pub fn safety_option_key(option: &str) -> String {
    if option.contains('.') {
        option.to_owned()
    } else {
        format!("{STRATEGY_SECTION}.{option}")
    }
}

impl std::fmt::Debug for SafetyCatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyCatch").finish_non_exhaustive()
    }
}
