//! Terminal rendering for task trees and plan lists

use colored::Colorize;
use prontustore::{Plan, PlanNode, TaskNode};

const INDENT: &str = "  ";

/// Render a task forest, one task per line, children indented under parents.
///
/// Parents show `[done/total]` over their direct children.
pub fn render_tree(nodes: &[TaskNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(&mut out, node, 0);
    }
    out
}

fn render_node(out: &mut String, node: &TaskNode, depth: usize) {
    let task = &node.task;
    let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let title = if task.completed {
        task.title.dimmed().to_string()
    } else {
        task.title.clone()
    };
    out.push_str(&INDENT.repeat(depth));
    out.push_str(&format!("{} {}", mark, title));
    if !node.children.is_empty() {
        let (done, total) = node.progress();
        let progress = format!("[{}/{}]", done, total);
        let progress = if done == total { progress.green() } else { progress.yellow() };
        out.push_str(&format!(" {}", progress));
    }
    out.push_str(&format!(" {}\n", format!("#{}", task.id).dimmed()));

    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

/// One line per plan: id, title, size, and whether it is built in
pub fn render_plan_list(plans: &[Plan]) -> String {
    let mut out = String::new();
    for plan in plans {
        let origin = if plan.is_custom { "custom".cyan() } else { "built-in".normal() };
        out.push_str(&format!(
            "{:>4}  {}  ({} tasks, {})\n",
            plan.id.to_string().yellow(),
            plan.title.bold(),
            plan.task_count(),
            origin
        ));
    }
    out
}

/// A plan's description followed by its template tree
pub fn render_plan(plan: &Plan) -> String {
    let mut out = format!("{}\n", plan.title.bold());
    if !plan.description.is_empty() {
        out.push_str(&format!("{}\n", plan.description.dimmed()));
    }
    out.push('\n');
    for node in &plan.tasks {
        render_plan_node(&mut out, node, 0);
    }
    out
}

fn render_plan_node(out: &mut String, node: &PlanNode, depth: usize) {
    let bullet = if node.completed == Some(true) { "[x]" } else { "-" };
    out.push_str(&format!("{}{} {}\n", INDENT.repeat(depth), bullet, node.title));
    for child in node.children() {
        render_plan_node(out, child, depth + 1);
    }
}
