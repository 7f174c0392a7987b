//! Canned multi-agent session used to populate an empty canvas (`--demo`).

use canvas_core::messages::BROADCAST;
use canvas_core::{
    CanvasError, FileUpdateReport, FullSnapshotReport, MemoryWriteReport, MessageReport, Report,
    StateAggregator, StepReport,
};
use tracing::debug;

const VISUALIZATION_CODE: &str = "import matplotlib.pyplot as plt\nimport numpy as np\n\n\
x = np.linspace(0, 10, 100)\ny = np.sin(x)\n\nplt.figure(figsize=(10, 6))\n\
plt.plot(x, y, '-b', label='sin(x)')\nplt.title('Simple Sine Wave')\nplt.legend()\n\
plt.savefig('sine_wave.png')\nplt.close()\n";

const REPORT_MARKDOWN: &str = "# Data Visualization Task Report\n\n## Libraries Explored\n\
- matplotlib\n- seaborn\n- plotly\n- bokeh\n\n## Selected Library\n\
matplotlib, for its simplicity and wide adoption.\n";

fn step(agent: &str, thought: &str, tool_call: &str) -> Report {
    Report::Step(StepReport {
        agent_name: agent.to_string(),
        thought: thought.to_string(),
        tool_call: tool_call.to_string(),
    })
}

fn memory(tier: &str, key: &str, value: &str) -> Report {
    Report::MemoryWrite(MemoryWriteReport {
        tier: tier.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn file(path: &str, content: &str) -> Report {
    Report::FileUpdate(FileUpdateReport {
        path: path.to_string(),
        content: content.to_string(),
    })
}

fn message(from: &str, to: &str, body: &str, priority: &str) -> Report {
    Report::MessageSent(MessageReport {
        from_agent: from.to_string(),
        to_agent: to.to_string(),
        message: body.to_string(),
        priority: priority.to_string(),
    })
}

fn initial_snapshot() -> Report {
    let tree = serde_json::json!({
        "workspace": {
            "agents": ["SystemAgent.py", "SearchAgent.py", "CodeAgent.py"],
            "tasks": {
                "visualization_task": ["plan.md", "requirements.txt"]
            },
            "output": ["report.md"]
        }
    });
    Report::FullSnapshot(FullSnapshotReport {
        workspace_tree: tree.to_string(),
        permanent_memory: serde_json::json!({
            "user_preferences": "The user prefers detailed explanations and has experience with Python.",
            "system_config": "System is running on macOS with Python 3.9."
        }),
        task_memory: serde_json::json!({
            "current_task": "Create a data visualization example using Python libraries.",
            "deadline": "2025-07-15"
        }),
        volatile_memory: Some(serde_json::json!({
            "session_id": "demo-session",
            "start_time": "2025-07-12T10:00:00"
        })),
    })
}

pub fn session() -> Vec<Report> {
    vec![
        initial_snapshot(),
        step("SystemAgent", "Starting up and checking the task", "check_task()"),
        memory(
            "permanent",
            "user_preferences",
            "The user prefers detailed explanations and has experience with Python.",
        ),
        file(
            "/workspace/tasks/visualization_task/plan.md",
            "# Visualization Task Plan\n\n1. Research visualization libraries\n\
             2. Select appropriate library for the task\n3. Create example code\n\
             4. Generate output report",
        ),
        step(
            "SystemAgent",
            "I need to search for information about Python libraries",
            "delegate('SearchAgent')",
        ),
        message(
            "SystemAgent",
            "SearchAgent",
            "Please search for Python visualization libraries and report back.",
            "high",
        ),
        step(
            "SearchAgent",
            "Searching for information about Python libraries",
            "search('Python libraries for data visualization')",
        ),
        memory(
            "task",
            "search_results",
            "Found matplotlib, seaborn, plotly, and bokeh as popular Python data visualization libraries.",
        ),
        memory("volatile", "search_time", "0.45 seconds"),
        message(
            "SearchAgent",
            "SystemAgent",
            "Found several visualization libraries: matplotlib, seaborn, plotly, and bokeh.",
            "normal",
        ),
        step(
            "SystemAgent",
            "Now I need to write some sample visualization code",
            "delegate('CodeAgent')",
        ),
        message(
            "SystemAgent",
            "CodeAgent",
            "Please write a sample visualization using matplotlib based on the search results.",
            "normal",
        ),
        step(
            "CodeAgent",
            "Writing sample matplotlib visualization code",
            "write_code('example_visualization.py')",
        ),
        file(
            "/workspace/tasks/visualization_task/example_visualization.py",
            VISUALIZATION_CODE,
        ),
        message(
            "CodeAgent",
            "SystemAgent",
            "Code for matplotlib visualization has been created. It generates a sine wave plot.",
            "normal",
        ),
        step("SystemAgent", "Creating final report", "write_file('report.md')"),
        file("/workspace/output/report.md", REPORT_MARKDOWN),
        step("SystemAgent", "Task completed successfully", "complete_task()"),
        message(
            "SystemAgent",
            BROADCAST,
            "Visualization task has been completed successfully. Thank you for your contributions.",
            "low",
        ),
    ]
}

/// Replays [`session`] into the aggregator, stopping at the first rejected report.
pub fn seed(canvas: &StateAggregator) -> Result<usize, CanvasError> {
    let reports = session();
    for report in &reports {
        let ack = canvas.ingest(report)?;
        debug!(event = "demo_report", kind = report.kind(), ack = %ack);
    }
    Ok(reports.len())
}
