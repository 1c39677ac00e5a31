//! Maps free task text onto an intent label.
//!
//! Resolution order: the text itself when it names a catalog action, then the
//! first matching regex rule, then the catalog action with the best token
//! overlap above [`SIMILARITY_THRESHOLD`], otherwise [`UNKNOWN_INTENT`].

use crate::catalog::ActionCatalog;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

/// Sentinel intent for text nothing else could place.
pub const UNKNOWN_INTENT: &str = "unknown_action";

/// Jaccard score a catalog action has to beat in the fallback step.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Rule table as `(intent, patterns)` entries. An intent may appear in several
/// entries; its patterns are merged into the position of its first entry.
const DEFAULT_RULES: &[(&str, &[&str])] = &[
    (
        "open_file",
        &[
            r"open.*file",
            r"file.*browser",
            r"browse.*file",
            r"file.*manager",
            r"finder",
            r"explorer",
        ],
    ),
    (
        "open_notepad",
        &[
            r"open.*notepad",
            r"text.*editor",
            r"edit.*text",
            r"create.*document",
            r"new.*text",
        ],
    ),
    (
        "mute_audio",
        &[
            r"\bmute\b",
            r"silence",
            r"\bquiet\b",
            r"turn.*off.*audio",
            r"disable.*sound",
        ],
    ),
    (
        "unmute_audio",
        &[
            r"unmute",
            r"sound.*on",
            r"audio.*on",
            r"enable.*sound",
            r"turn.*on.*audio",
        ],
    ),
    (
        "volume_up",
        &[
            r"volume.*up",
            r"louder",
            r"increase.*volume",
            r"raise.*volume",
            r"boost.*sound",
        ],
    ),
    (
        "volume_down",
        &[
            r"volume.*down",
            r"quieter",
            r"decrease.*volume",
            r"lower.*volume",
            r"reduce.*sound",
        ],
    ),
    (
        "take_screenshot",
        &[
            r"screenshot",
            r"capture.*screen",
            r"screen.*shot",
            r"save.*screen",
            r"snap.*screen",
        ],
    ),
    (
        "open_browser",
        &[
            r"open.*browser",
            r"web.*browser",
            r"internet",
            r"launch.*browser",
            r"start.*browser",
        ],
    ),
    (
        "open_calculator",
        &[r"calculator", r"calc", r"math", r"arithmetic", r"compute"],
    ),
    (
        "open_calendar",
        &[r"calendar", r"schedule", r"appointments", r"events", r"planner"],
    ),
    (
        "lock_screen",
        &[
            r"lock.*screen",
            r"lock.*computer",
            r"secure.*system",
            r"screen.*lock",
        ],
    ),
    (
        "minimize_all_windows",
        &[
            r"minimize.*all",
            r"hide.*all",
            r"desktop",
            r"show.*desktop",
            r"clear.*screen",
        ],
    ),
    (
        "close_active_window",
        &[
            r"close.*window",
            r"close.*app",
            r"close.*current",
            r"exit.*window",
        ],
    ),
    (
        "open_task_manager",
        &[
            r"task.*manager",
            r"activity.*monitor",
            r"processes",
            r"process.*manager",
        ],
    ),
    (
        "show_system_info",
        &[
            r"system.*info",
            r"computer.*info",
            r"specs",
            r"hardware.*info",
            r"system.*specs",
        ],
    ),
    (
        "check_network_status",
        &[
            r"network.*status",
            r"internet.*connection",
            r"connectivity",
            r"network.*test",
        ],
    ),
    // productivity
    (
        "open_notepad",
        &[
            r"word.*document",
            r"text.*document",
            r"document.*editor",
            r"word.*processor",
        ],
    ),
    (
        "open_calculator",
        &[r"spreadsheet", r"excel", r"numbers", r"calc.*sheet"],
    ),
    (
        "open_browser",
        &[r"search.*online", r"web.*search", r"google", r"browse.*web"],
    ),
    (
        "open_calendar",
        &[
            r"meeting",
            r"appointment",
            r"schedule.*meeting",
            r"calendar.*event",
        ],
    ),
    // media
    (
        "take_screenshot",
        &[r"record.*screen", r"screen.*recording", r"capture.*video"],
    ),
    (
        "open_browser",
        &[
            r"music.*player",
            r"media.*player",
            r"play.*music",
            r"audio.*player",
        ],
    ),
    (
        "show_system_info",
        &[
            r"photo.*gallery",
            r"image.*viewer",
            r"picture.*viewer",
            r"photos",
        ],
    ),
    // security
    (
        "lock_screen",
        &[
            r"privacy.*settings",
            r"security.*settings",
            r"enable.*firewall",
        ],
    ),
    (
        "show_system_info",
        &[r"antivirus", r"malware.*scan", r"security.*scan"],
    ),
    (
        "open_browser",
        &[r"password.*manager", r"secure.*login", r"vpn.*connection"],
    ),
    // development
    (
        "open_notepad",
        &[
            r"code.*editor",
            r"\bide\b",
            r"development.*environment",
            r"programming",
        ],
    ),
    (
        "open_terminal",
        &[
            r"terminal",
            r"command.*prompt",
            r"console",
            r"shell",
            r"bash",
        ],
    ),
    (
        "show_system_info",
        &[r"database.*client", r"server.*monitor", r"log.*viewer"],
    ),
    (
        "open_task_manager",
        &[r"docker", r"container", r"virtual.*machine", r"\bvm\b"],
    ),
];

/// One ranked rule: any matching pattern yields `intent`.
#[derive(Debug, Clone)]
pub struct IntentRule {
    intent: String,
    patterns: Vec<Regex>,
}

impl IntentRule {
    pub fn new<I, S>(intent: impl Into<String>, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            intent: intent.into(),
            patterns,
        })
    }

    #[must_use]
    pub fn intent(&self) -> &str {
        &self.intent
    }

    fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// How an intent was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResolvedBy {
    Identity,
    Rule { index: usize },
    Similarity { score: f64 },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub intent: String,
    pub via: ResolvedBy,
}

#[derive(Debug, Clone)]
pub struct IntentResolver {
    rules: Vec<IntentRule>,
    threshold: f64,
}

impl Default for IntentResolver {
    /// Resolver over the built-in device rule table.
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|(intent, patterns)| IntentRule::new(*intent, patterns.iter()).ok())
            .collect();
        Self::new(rules)
    }
}

impl IntentResolver {
    /// Rules for the same intent are merged into the first one given, so an
    /// intent ranks by its earliest declaration.
    #[must_use]
    pub fn new(rules: Vec<IntentRule>) -> Self {
        let mut merged: Vec<IntentRule> = Vec::with_capacity(rules.len());
        for rule in rules {
            match merged.iter_mut().find(|r| r.intent == rule.intent) {
                Some(first) => first.patterns.extend(rule.patterns),
                None => merged.push(rule),
            }
        }
        Self {
            rules: merged,
            threshold: SIMILARITY_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            SIMILARITY_THRESHOLD
        };
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Resolves `text` to an intent label; never fails.
    #[must_use]
    pub fn resolve(&self, text: &str, catalog: &ActionCatalog) -> String {
        self.resolve_detailed(text, catalog).intent
    }

    #[must_use]
    pub fn resolve_detailed(&self, text: &str, catalog: &ActionCatalog) -> Resolution {
        let normalized = text.trim().to_lowercase();

        if catalog.contains(&normalized) {
            return Resolution {
                intent: normalized,
                via: ResolvedBy::Identity,
            };
        }

        if let Some((index, rule)) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(&normalized))
        {
            return Resolution {
                intent: rule.intent.clone(),
                via: ResolvedBy::Rule { index },
            };
        }

        let task_words = words(&normalized);
        let mut best: Option<(&str, f64)> = None;
        for action in catalog.iter() {
            let score = jaccard(&words(&action.to_lowercase()), &task_words);
            let best_score = best.map_or(0.0, |(_, s)| s);
            if score > best_score && score > self.threshold {
                best = Some((action, score));
            }
        }

        match best {
            Some((action, score)) => Resolution {
                intent: action.to_string(),
                via: ResolvedBy::Similarity { score },
            },
            None => Resolution {
                intent: UNKNOWN_INTENT.to_string(),
                via: ResolvedBy::Unknown,
            },
        }
    }
}

fn words(text: &str) -> HashSet<String> {
    text.replace('_', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        a.intersection(b).count() as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ActionCatalog {
        ActionCatalog::new([
            "open_file_browser",
            "mute_audio",
            "unmute_audio",
            "volume_down",
            "take_screenshot",
            "open_photo_viewer",
            "check_disk_usage",
            "check_memory_usage",
            "open_terminal",
            "minimize_all_windows",
        ])
        .unwrap()
    }

    #[test]
    fn every_default_pattern_compiles() {
        let resolver = IntentResolver::default();
        let declared: usize = DEFAULT_RULES.iter().map(|(_, p)| p.len()).sum();
        let compiled: usize = resolver.rules().iter().map(|r| r.patterns.len()).sum();
        assert_eq!(compiled, declared);

        let mut first_seen: Vec<&str> = Vec::new();
        for (intent, _) in DEFAULT_RULES {
            if !first_seen.contains(intent) {
                first_seen.push(*intent);
            }
        }
        let order: Vec<&str> = resolver.rules().iter().map(IntentRule::intent).collect();
        assert_eq!(order, first_seen);
    }

    #[test]
    fn catalog_action_is_its_own_intent() {
        let resolver = IntentResolver::default();
        // "open_file_browser" would also hit the `open.*file` rule.
        let res = resolver.resolve_detailed("  Open_File_Browser ", &catalog());
        assert_eq!(res.intent, "open_file_browser");
        assert_eq!(res.via, ResolvedBy::Identity);
    }

    #[test]
    fn regex_rules_search_anywhere_in_text() {
        let resolver = IntentResolver::default();
        let cat = catalog();
        assert_eq!(resolver.resolve("take screenshot", &cat), "take_screenshot");
        assert_eq!(resolver.resolve("please MUTE audio now", &cat), "mute_audio");
        assert_eq!(resolver.resolve("unmute the speakers", &cat), "unmute_audio");
        assert_eq!(resolver.resolve("make it quieter", &cat), "volume_down");
        assert_eq!(resolver.resolve("hide all windows", &cat), "minimize_all_windows");
    }

    #[test]
    fn earlier_rule_entries_win() {
        let resolver = IntentResolver::default();
        // Development group: the code editor entry precedes the terminal entry.
        assert_eq!(
            resolver.resolve("launch code editor in the console", &catalog()),
            "open_notepad"
        );
        assert_eq!(resolver.resolve("open a bash shell", &catalog()), "open_terminal");
    }

    #[test]
    fn later_entries_for_same_intent_are_kept() {
        let resolver = IntentResolver::default();
        assert_eq!(resolver.resolve("scan for malware scan", &catalog()), "show_system_info");
        assert_eq!(resolver.resolve("start docker", &catalog()), "open_task_manager");
    }

    #[test]
    fn later_entries_rank_at_first_declaration() {
        let resolver = IntentResolver::default();
        let cat = catalog();
        // `google` is declared late for open_browser, but open_browser itself
        // is declared before open_calendar.
        assert_eq!(resolver.resolve("google calendar", &cat), "open_browser");
        assert_eq!(
            resolver.resolve("word document on the desktop", &cat),
            "open_notepad"
        );
        assert_eq!(resolver.resolve("spreadsheet schedule", &cat), "open_calculator");

        let res = resolver.resolve_detailed("google calendar", &cat);
        let browser = resolver
            .rules()
            .iter()
            .position(|r| r.intent() == "open_browser")
            .unwrap();
        assert_eq!(res.via, ResolvedBy::Rule { index: browser });
    }

    #[test]
    fn custom_rules_for_one_intent_are_merged() {
        let resolver = IntentResolver::new(vec![
            IntentRule::new("volume_down", ["softer"]).unwrap(),
            IntentRule::new("mute_audio", ["silent"]).unwrap(),
            IntentRule::new("volume_down", ["silent.*please"]).unwrap(),
        ]);
        assert_eq!(resolver.rules().len(), 2);
        assert_eq!(resolver.resolve("silent please", &catalog()), "volume_down");
        assert_eq!(resolver.resolve("silent", &catalog()), "mute_audio");
    }

    #[test]
    fn falls_back_to_token_overlap() {
        let resolver = IntentResolver::default();
        let res = resolver.resolve_detailed("check disk usage", &catalog());
        assert_eq!(res.intent, "check_disk_usage");
        assert!(matches!(res.via, ResolvedBy::Similarity { score } if (score - 1.0).abs() < 1e-12));

        // Equal scores: first catalog entry wins.
        let res = resolver.resolve_detailed("check usage", &catalog());
        assert_eq!(res.intent, "check_disk_usage");
    }

    #[test]
    fn overlap_must_exceed_threshold() {
        let resolver = IntentResolver::default();
        // {check} / {check, disk, usage, for, me, please} = 1/6
        assert_eq!(
            resolver.resolve("check for me please", &catalog()),
            UNKNOWN_INTENT
        );
    }

    #[test]
    fn gibberish_is_unknown() {
        let resolver = IntentResolver::default();
        let res = resolver.resolve_detailed("xyzzy unrecognized gibberish", &catalog());
        assert_eq!(res.intent, UNKNOWN_INTENT);
        assert_eq!(res.via, ResolvedBy::Unknown);
        assert_eq!(resolver.resolve("", &catalog()), UNKNOWN_INTENT);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let rules = vec![
            IntentRule::new("volume_down", ["turn it down"]).unwrap(),
            IntentRule::new("mute_audio", ["down"]).unwrap(),
        ];
        let resolver = IntentResolver::new(rules);
        assert_eq!(resolver.resolve("turn it down", &catalog()), "volume_down");
        assert_eq!(resolver.resolve("down please", &catalog()), "mute_audio");
        assert!(IntentRule::new("broken", ["("]).is_err());
    }
}
