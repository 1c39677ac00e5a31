//! Stand-in device executor: every catalog action "runs" without side effects.

use devlern_core::{Execution, ExecutionError, Executor};
use serde_json::Value;

/// Device actions by category, in registration order.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "file",
        &[
            "open_file_browser",
            "open_notepad",
            "open_text_editor",
            "create_new_file",
            "delete_file",
            "open_documents_folder",
            "open_downloads_folder",
            "open_pictures_folder",
        ],
    ),
    (
        "audio",
        &[
            "mute_audio",
            "unmute_audio",
            "volume_up",
            "volume_down",
            "toggle_audio",
            "max_volume",
            "min_volume",
        ],
    ),
    (
        "system",
        &[
            "take_screenshot",
            "lock_screen",
            "open_task_manager",
            "minimize_all_windows",
            "close_active_window",
            "show_system_info",
            "check_network_status",
            "check_disk_usage",
            "check_memory_usage",
            "check_battery_status",
        ],
    ),
    (
        "application",
        &[
            "open_browser",
            "open_calculator",
            "open_calendar",
            "open_terminal",
            "open_settings",
            "open_email_app",
            "open_music_player",
            "open_photo_viewer",
            "open_video_player",
        ],
    ),
    (
        "window",
        &[
            "maximize_window",
            "minimize_window",
            "switch_window",
            "close_all_windows",
            "tile_windows",
            "fullscreen_mode",
            "snap_window_left",
            "snap_window_right",
        ],
    ),
    (
        "performance",
        &["show_running_processes", "check_cpu_usage", "monitor_performance"],
    ),
    (
        "productivity",
        &[
            "create_document",
            "open_spreadsheet",
            "search_online",
            "set_reminder",
            "start_timer",
        ],
    ),
    (
        "security",
        &[
            "clear_browser_data",
            "check_privacy_settings",
            "enable_firewall",
            "scan_for_malware",
        ],
    ),
];

#[derive(Debug, Default)]
pub struct SimulatedExecutor {
    executed: u64,
}

impl SimulatedExecutor {
    fn category(action: &str) -> Option<&'static str> {
        CATALOG
            .iter()
            .find(|(_, actions)| actions.iter().any(|a| *a == action))
            .map(|(category, _)| *category)
    }
}

impl Executor for SimulatedExecutor {
    fn list_actions(&self) -> Vec<String> {
        CATALOG
            .iter()
            .flat_map(|(_, actions)| actions.iter().map(|a| (*a).to_string()))
            .collect()
    }

    fn execute(&mut self, action: &str, params: Option<&Value>) -> Result<Execution, ExecutionError> {
        let Some(category) = Self::category(action) else {
            return Ok(Execution::failed(format!("Unknown action: {action}"))
                .with_info("error", Value::String("unknown action".into())));
        };
        self.executed += 1;
        let mut execution = Execution::ok(format!("{} (simulated)", action.replace('_', " ")))
            .with_info("category", Value::String(category.into()))
            .with_info("simulated", Value::Bool(true))
            .with_info("sequence", Value::from(self.executed));
        if let Some(params) = params {
            execution = execution.with_info("params", params.clone());
        }
        Ok(execution)
    }
}
