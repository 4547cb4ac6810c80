#![cfg(unix)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use breba_core::Agent;
use breba_core::CommandExecutor;
use breba_core::CommandReport;
use breba_core::ContainerCommandExecutor;
use breba_core::DocumentAnalyzer;
use breba_core::ExecutorError;
use breba_core::Goal;
use breba_core::InputProvider;
use breba_core::LocalCommandExecutor;
use breba_core::NO_OP_ANSWER;
use breba_pty_server::PtyServer;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

/// Shell server on a background thread, stopped when the guard drops.
struct ServerGuard {
    addr: SocketAddr,
    token: CancellationToken,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerGuard {
    fn start() -> Self {
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("server runtime");
            runtime.block_on(async move {
                let server = PtyServer::bind("127.0.0.1:0".parse().expect("loopback addr"))
                    .await
                    .expect("bind");
                ready_tx
                    .send((server.local_addr().expect("addr"), server.shutdown_token()))
                    .expect("report readiness");
                let _ = server.serve().await;
            });
        });
        let (addr, token) = ready_rx.recv().expect("server comes up");
        Self {
            addr,
            token,
            thread: Some(thread),
        }
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct NeverAnswer;

impl InputProvider for NeverAnswer {
    fn get_input(&self, _console_output: &str) -> Option<String> {
        None
    }
}

struct DateAnswer;

impl InputProvider for DateAnswer {
    fn get_input(&self, console_output: &str) -> Option<String> {
        console_output
            .contains("(YYYY-MM-DD)")
            .then(|| "2023-10-05".to_string())
    }
}

struct PromptAnswer;

impl InputProvider for PromptAnswer {
    fn get_input(&self, console_output: &str) -> Option<String> {
        console_output
            .contains("Enter: ")
            .then(|| "answer".to_string())
    }
}

/// Agent double that reads the command back out of the echoed `$ ` line and
/// calls anything without an error in it a success.
struct ScriptedAgent {
    goals: Vec<Goal>,
    commands: Vec<String>,
}

impl Agent for ScriptedAgent {
    fn fetch_goals(&self, _document: &str) -> Vec<Goal> {
        self.goals.clone()
    }

    fn fetch_commands(&self, _document: &str, _goal: &Goal) -> Vec<String> {
        self.commands.clone()
    }

    fn analyze_output(&self, output: &str) -> CommandReport {
        let command = output
            .lines()
            .next()
            .unwrap_or("")
            .trim_start_matches("$ ")
            .to_string();
        CommandReport {
            command,
            success: Some(!output.contains("command not found")),
            insights: None,
        }
    }

    fn provide_input(&self, _output: &str) -> String {
        NO_OP_ANSWER.to_string()
    }
}

#[test]
fn container_executor_keeps_state_within_a_session() {
    let server = ServerGuard::start();
    let mut executor = ContainerCommandExecutor::with_address(Box::new(NeverAnswer), server.addr)
        .expect("runtime");
    executor.connect().expect("connect");
    assert!(matches!(
        executor.connect(),
        Err(ExecutorError::AlreadyConnected)
    ));

    let output = executor
        .execute_command("export MY_VAR=Testing")
        .expect("run");
    assert!(
        output.contains("$ export MY_VAR=Testing"),
        "unexpected: {output:?}"
    );
    assert!(
        !output.contains("Completed"),
        "marker must be stripped: {output:?}"
    );

    let output = executor.execute_command("echo $MY_VAR").expect("run");
    assert!(
        output.contains("$ echo $MY_VAR\nTesting"),
        "unexpected: {output:?}"
    );

    executor.disconnect().expect("disconnect");
    assert!(matches!(
        executor.disconnect(),
        Err(ExecutorError::NotConnected)
    ));
}

#[test]
fn container_executor_answers_prompts_and_keeps_the_answer() {
    let server = ServerGuard::start();
    let mut executor =
        ContainerCommandExecutor::with_address(Box::new(DateAnswer), server.addr).expect("runtime");
    executor.connect().expect("connect");

    let command = r#"read -p "Please enter October 5, 2023 in this format (YYYY-MM-DD): " user_date"#;
    let output = executor.execute_command(command).expect("run");
    assert!(
        output.contains("(YYYY-MM-DD): 2023-10-05"),
        "unexpected: {output:?}"
    );

    let output = executor
        .execute_command("echo Hello there $user_date")
        .expect("run");
    assert!(
        output.contains("Hello there 2023-10-05"),
        "unexpected: {output:?}"
    );

    executor.disconnect().expect("disconnect");
}

#[test]
fn an_unanswered_prompt_gives_up_with_partial_output() {
    let server = ServerGuard::start();
    let mut executor = ContainerCommandExecutor::with_address(Box::new(NeverAnswer), server.addr)
        .expect("runtime");
    executor.connect().expect("connect");

    let started = Instant::now();
    let output = executor
        .execute_command(r#"read -p "Proceed (Y/n) " answer"#)
        .expect("run");
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "gave up too slowly"
    );
    assert!(output.contains("Proceed (Y/n) "), "unexpected: {output:?}");
    assert!(
        !output.contains("Completed"),
        "command cannot have completed: {output:?}"
    );

    executor.disconnect().expect("disconnect");
}

#[test]
fn an_unconnected_executor_opens_a_single_use_session() {
    let server = ServerGuard::start();
    let mut executor = ContainerCommandExecutor::with_address(Box::new(NeverAnswer), server.addr)
        .expect("runtime");

    let output = executor.execute_command("echo solo").expect("auto session");
    assert!(output.contains("$ echo solo\nsolo"), "unexpected: {output:?}");

    assert!(matches!(
        executor.disconnect(),
        Err(ExecutorError::NotConnected)
    ));
}

#[test]
fn the_analyzer_verifies_each_goal_in_its_own_session() {
    let server = ServerGuard::start();
    let agent = Arc::new(ScriptedAgent {
        goals: vec![Goal {
            name: "install".to_string(),
            description: "set things up".to_string(),
        }],
        commands: vec!["export STEP=done".to_string(), "echo $STEP".to_string()],
    });
    let analyzer = DocumentAnalyzer::with_address(agent, server.addr);
    let report = analyzer
        .analyze("# How to install", "README.md")
        .expect("analysis");

    assert_eq!(report.file, "README.md");
    assert_eq!(report.goal_reports.len(), 1);
    let goal_report = &report.goal_reports[0];
    assert_eq!(goal_report.goal_name, "install");
    assert_eq!(goal_report.command_reports.len(), 2);
    assert_eq!(goal_report.command_reports[0].command, "export STEP=done");
    assert_eq!(goal_report.command_reports[1].command, "echo $STEP");
    assert!(
        goal_report
            .command_reports
            .iter()
            .all(|report| report.success == Some(true))
    );
}

#[test]
fn local_executor_strips_the_marker_from_single_commands() {
    let mut executor = LocalCommandExecutor::new(Box::new(NeverAnswer));
    let output = executor.execute_command("echo hello").expect("shell runs");
    assert_eq!(output, "$ echo hello\nhello\n");
}

#[test]
fn local_executor_runs_a_batch_in_one_shell() {
    let agent = ScriptedAgent {
        goals: Vec::new(),
        commands: Vec::new(),
    };
    let mut executor = LocalCommandExecutor::new(Box::new(NeverAnswer));
    let commands = vec!["export GREETING=hi".to_string(), "echo $GREETING".to_string()];
    let reports = executor
        .execute_commands_sync(&commands, &agent)
        .expect("shell runs");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].command, "echo $GREETING");
    assert!(reports.iter().all(|report| report.success == Some(true)));
}

#[test]
fn local_executor_answers_prompts() {
    let mut executor = LocalCommandExecutor::new(Box::new(PromptAnswer));
    let output = executor
        .execute_command(r#"read -p "Enter: " x && echo "x is $x""#)
        .expect("shell runs");
    assert!(output.contains("Enter: answer"), "unexpected: {output:?}");
    assert!(output.contains("x is answer"), "unexpected: {output:?}");
}
