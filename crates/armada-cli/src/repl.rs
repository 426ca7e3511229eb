//! REPL – the operator shell of one coordinator.
//!
//! Supported slash-commands:
//!   /help                              – show this list
//!   /configs                           – known robot configs, local and remote
//!   /robots                            – loaded robots
//!   /resources                         – tracked resources and their status
//!   /load <robot>                      – load a robot (locally or at its owner)
//!   /unload <robot>                    – unload a robot
//!   /plan <robot> [group] [target]     – plan toward a named target
//!   /execute <robot>                   – execute the last plan
//!   /target <robot>                    – current end-effector pose
//!   /navigate <robot> <frame> <x> <y>  – send a navigation goal
//!   /gripper <robot> <position>        – command the gripper
//!   /viz <robot>                       – visualisation info
//!   /config <robot>                    – the robot's config document
//!   /quit | /exit                      – gracefully exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use armada_runtime::RobotManager;
use armada_types::{FleetError, PlanTarget, Pose, PoseStamped};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Configs,
    Robots,
    Resources,
    Load(String),
    Unload(String),
    Plan {
        robot: String,
        group: String,
        target: PlanTarget,
    },
    Execute(String),
    Target(String),
    Navigate {
        robot: String,
        frame: String,
        x: f64,
        y: f64,
    },
    Gripper {
        robot: String,
        position: f32,
    },
    Viz(String),
    Config(String),
    Quit,
}

const USAGE_HINT: &str = "Type /help for available commands.";

/// Parse one input line.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();
    let robot = |usage: &str| -> Result<String, String> {
        args.first()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("usage: {usage}"))
    };

    let command = match head {
        "/help" => Command::Help,
        "/configs" => Command::Configs,
        "/robots" => Command::Robots,
        "/resources" => Command::Resources,
        "/load" => Command::Load(robot("/load <robot>")?),
        "/unload" => Command::Unload(robot("/unload <robot>")?),
        "/plan" => Command::Plan {
            robot: robot("/plan <robot> [group] [target]")?,
            group: args.get(1).map(|s| s.to_string()).unwrap_or_default(),
            target: match args.get(2) {
                Some(name) => PlanTarget::Named(name.to_string()),
                None => PlanTarget::Default,
            },
        },
        "/execute" => Command::Execute(robot("/execute <robot>")?),
        "/target" => Command::Target(robot("/target <robot>")?),
        "/navigate" => {
            let usage = "usage: /navigate <robot> <frame> <x> <y>";
            let [robot, frame, x, y] = args.as_slice() else {
                return Err(usage.into());
            };
            Command::Navigate {
                robot: robot.to_string(),
                frame: frame.to_string(),
                x: x.parse().map_err(|_| format!("x is not a number: {x}"))?,
                y: y.parse().map_err(|_| format!("y is not a number: {y}"))?,
            }
        }
        "/gripper" => {
            let [robot, position] = args.as_slice() else {
                return Err("usage: /gripper <robot> <position>".into());
            };
            Command::Gripper {
                robot: robot.to_string(),
                position: position
                    .parse()
                    .map_err(|_| format!("position is not a number: {position}"))?,
            }
        }
        "/viz" => Command::Viz(robot("/viz <robot>")?),
        "/config" => Command::Config(robot("/config <robot>")?),
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(runtime: &Runtime, manager: &Arc<RobotManager>, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let prompt = format!("{}>", manager.namespace());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", prompt.bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(command) => runtime.block_on(execute(manager, command)),
            Err(e) => println!("{} {}. {}", "Error:".red(), e.yellow(), USAGE_HINT),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn execute(manager: &RobotManager, command: Command) {
    let outcome = match command {
        Command::Help => {
            cmd_help();
            Ok(())
        }
        Command::Configs => {
            cmd_configs(manager).await;
            Ok(())
        }
        Command::Robots => {
            cmd_robots(manager).await;
            Ok(())
        }
        Command::Resources => {
            cmd_resources(manager);
            Ok(())
        }
        Command::Load(robot) => manager.load(&robot).await.map(|handle| {
            println!(
                "  {} {} loaded at {} (handle {})",
                "✓".green().bold(),
                handle.robot_name.bold(),
                handle.owning_namespace.cyan(),
                handle.handle.to_string().dimmed()
            );
        }),
        Command::Unload(robot) => manager.unload(&robot).await.map(|()| done(&format!("{robot} unloaded"))),
        Command::Plan { robot, group, target } => manager
            .plan_manipulation(&robot, &group, target)
            .await
            .map(|()| done("plan found")),
        Command::Execute(robot) => manager.execute_plan(&robot).await.map(|()| done("plan executed")),
        Command::Target(robot) => manager.manipulation_target(&robot).await.map(|pose| print_pose(&pose)),
        Command::Navigate { robot, frame, x, y } => {
            let target = PoseStamped::new(frame.clone(), Pose::from_position(x, y, 0.0));
            manager
                .navigate(&robot, &frame, target)
                .await
                .map(|()| done("goal reached"))
        }
        Command::Gripper { robot, position } => manager
            .control_gripper(&robot, position)
            .await
            .map(|()| done("gripper commanded")),
        Command::Viz(robot) => manager.viz_info(&robot).await.map(|info| println!("{info}")),
        Command::Config(robot) => manager.get_robot_config(&robot).await.map(|(document, abs_ns)| {
            println!("  {}", abs_ns.bold());
            println!("{document}");
        }),
        Command::Quit => Ok(()),
    };
    if let Err(e) = outcome {
        print_error(&e);
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Armada Commands".bold().underline());
    println!("  {}                – known robot configs", "/configs".bold().cyan());
    println!("  {}                 – loaded robots", "/robots".bold().cyan());
    println!("  {}              – tracked resources", "/resources".bold().cyan());
    println!("  {}   – load a robot", "/load <robot>".bold().cyan());
    println!("  {} – unload a robot", "/unload <robot>".bold().cyan());
    println!("  {} – plan toward a named target", "/plan <robot> [group] [target]".bold().cyan());
    println!("  {} – execute the last plan", "/execute <robot>".bold().cyan());
    println!("  {} – current end-effector pose", "/target <robot>".bold().cyan());
    println!("  {} – navigation goal", "/navigate <robot> <frame> <x> <y>".bold().cyan());
    println!("  {} – gripper position", "/gripper <robot> <position>".bold().cyan());
    println!("  {} – visualisation info", "/viz <robot>".bold().cyan());
    println!("  {} – config document", "/config <robot>".bold().cyan());
    println!("  {}           – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

async fn cmd_configs(manager: &RobotManager) {
    let (local, remote) = manager.known_configs().await;
    if local.is_empty() && remote.is_empty() {
        println!("  {}", "No robot configs known yet.".dimmed());
        return;
    }
    println!("{}", "Robot configs".bold().underline());
    for (origin, configs) in [("local", local), ("remote", remote)] {
        for config in configs {
            println!(
                "  {:<20} {:<16} {:<7} reliability {:.2}",
                config.name().bold(),
                config.owning_namespace().cyan(),
                origin,
                config.reliability()
            );
        }
    }
}

async fn cmd_robots(manager: &RobotManager) {
    let robots = manager.loaded_robots().await;
    if robots.is_empty() {
        println!("  {}", "No robots loaded.".dimmed());
        return;
    }
    for robot in robots {
        println!(
            "  {:<20} {:<16} since {}",
            robot.robot_name.bold(),
            robot.owning_namespace.cyan(),
            robot.loaded_at.format("%H:%M:%S")
        );
    }
}

fn cmd_resources(manager: &RobotManager) {
    let resources = manager.tracker().snapshot();
    if resources.is_empty() {
        println!("  {}", "No resources tracked.".dimmed());
        return;
    }
    for (id, spec, status) in resources {
        println!("  {:<6} {:<8} {}", id.to_string().bold(), status.as_str(), spec);
    }
}

fn done(message: &str) {
    println!("  {} {}", "✓".green().bold(), message);
}

fn print_pose(pose: &Pose) {
    println!(
        "  position ({:.3}, {:.3}, {:.3})  orientation ({:.3}, {:.3}, {:.3}, {:.3})",
        pose.position.x,
        pose.position.y,
        pose.position.z,
        pose.orientation.x,
        pose.orientation.y,
        pose.orientation.z,
        pose.orientation.w
    );
}

fn print_error(e: &FleetError) {
    println!("  {} {}", "✗".red().bold(), e.report());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_defaults_group_and_target() {
        assert_eq!(
            parse("/plan arm1").unwrap(),
            Command::Plan {
                robot: "arm1".into(),
                group: String::new(),
                target: PlanTarget::Default,
            }
        );
        assert_eq!(
            parse("/plan arm1 arm home").unwrap(),
            Command::Plan {
                robot: "arm1".into(),
                group: "arm".into(),
                target: PlanTarget::Named("home".into()),
            }
        );
    }

    #[test]
    fn navigate_needs_numeric_coordinates() {
        assert_eq!(
            parse("/navigate base1 map 2.5 -1").unwrap(),
            Command::Navigate {
                robot: "base1".into(),
                frame: "map".into(),
                x: 2.5,
                y: -1.0,
            }
        );
        assert!(parse("/navigate base1 map two 1").is_err());
        assert!(parse("/navigate base1 map").is_err());
    }

    #[test]
    fn robot_argument_is_required() {
        assert!(parse("/load").is_err());
        assert_eq!(parse("/load  arm1 ").unwrap(), Command::Load("arm1".into()));
        assert_eq!(
            parse("/gripper arm1 0.02").unwrap(),
            Command::Gripper {
                robot: "arm1".into(),
                position: 0.02,
            }
        );
    }

    #[test]
    fn unknown_and_quit_commands() {
        assert!(parse("/dance").unwrap_err().contains("/dance"));
        assert_eq!(parse("/exit").unwrap(), Command::Quit);
    }
}
