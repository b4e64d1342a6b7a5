//! Demo data for an empty remote store.
//!
//! [`init_database`] seeds only when the `sprints` collection is empty, so it
//! is safe to call on every start.

use std::collections::HashMap;

use chrono::NaiveDate;
use futures::future::try_join_all;

use crate::models::{
    ActivityEntry, ActivityKind, Epic, Issue, IssueStatus, IssueType, Priority, Sprint,
    SprintStatus, Subtask, Task, TaskStatus, TaskType,
};
use crate::remote::{RemoteError, RemoteStore};

struct SeedSprint {
    name: &'static str,
    start: &'static str,
    end: &'static str,
    status: SprintStatus,
    goal: &'static str,
    points: u32,
}

const SPRINTS: [SeedSprint; 2] = [
    SeedSprint {
        name: "Sprint 1",
        start: "2024-08-01",
        end: "2024-08-15",
        status: SprintStatus::Completed,
        goal: "Auth & user management",
        points: 43,
    },
    SeedSprint {
        name: "Sprint 2",
        start: "2024-10-01",
        end: "2024-10-15",
        status: SprintStatus::Active,
        goal: "Dashboard, payments, CI/CD",
        points: 45,
    },
];

/// (sprint index, type, title, status, priority, assignee, points, tags, due)
type SeedTask = (
    Option<usize>,
    TaskType,
    &'static str,
    TaskStatus,
    Priority,
    Option<&'static str>,
    u32,
    &'static [&'static str],
    Option<&'static str>,
);

const TASKS: &[SeedTask] = {
    use Priority::*;
    use TaskStatus::*;
    use TaskType::{Bug, Story};
    &[
        (Some(0), Story, "User registration flow", Done, High, Some("alice"), 8, &["auth", "frontend"], Some("2024-08-10")),
        (Some(0), TaskType::Task, "JWT auth middleware", Done, Critical, Some("bob"), 5, &["auth", "backend"], Some("2024-08-08")),
        (Some(0), Bug, "Fix CORS on /auth endpoints", Done, High, Some("bob"), 2, &["bug", "backend"], Some("2024-08-05")),
        (Some(0), Story, "Password reset via email link", Done, Normal, Some("alice"), 5, &["auth", "email"], Some("2024-08-12")),
        (Some(0), TaskType::Task, "Role-based access control", Done, High, Some("bob"), 5, &["auth", "backend"], Some("2024-08-14")),
        (Some(0), Story, "User profile page", Done, Normal, Some("alice"), 3, &["frontend"], Some("2024-08-13")),
        (Some(0), TaskType::Task, "Session management & logout", Done, Normal, Some("dave"), 3, &["auth"], Some("2024-08-11")),
        (Some(0), Bug, "Login redirect loop on mobile", Done, Critical, Some("carol"), 3, &["bug", "mobile"], Some("2024-08-06")),
        (Some(0), TaskType::Task, "2FA via TOTP", Done, High, Some("bob"), 8, &["auth", "security"], Some("2024-08-15")),
        (Some(0), Story, "Google OAuth sign-in", Done, High, Some("alice"), 8, &["auth", "oauth"], Some("2024-08-15")),
        (Some(1), Story, "Dashboard widget layout", New, High, Some("alice"), 13, &["frontend", "dashboard"], Some("2024-10-10")),
        (Some(1), TaskType::Task, "API rate limiting middleware", New, Normal, Some("dave"), 3, &["backend", "api"], Some("2024-10-08")),
        (Some(1), Story, "OAuth 2.0 login integration", InProgress, Critical, Some("alice"), 8, &["auth", "oauth"], Some("2024-10-05")),
        (Some(1), Story, "User settings & preferences", InProgress, Normal, Some("bob"), 5, &["frontend", "settings"], Some("2024-10-09")),
        (Some(1), TaskType::Task, "CI/CD pipeline with GitHub Actions", ReadyTest, High, Some("dave"), 5, &["devops", "ci-cd"], Some("2024-10-07")),
        (Some(1), Bug, "Memory leak in WebSocket handler", ReadyTest, Critical, Some("bob"), 2, &["bug", "backend"], Some("2024-10-03")),
        (Some(1), Story, "Stripe payment checkout", ReadyDeploy, High, Some("carol"), 8, &["payments", "backend"], Some("2024-10-11")),
        (Some(1), Bug, "Fix 404 on production page refresh", Done, Normal, Some("dave"), 1, &["bug", "devops"], Some("2024-10-02")),
        (None, Story, "Email notification system", New, Normal, Some("alice"), 5, &["email"], None),
        (None, TaskType::Task, "DB indexing optimization", New, Low, Some("bob"), 3, &["backend"], None),
        (None, Story, "Mobile responsive navigation", New, Normal, None, 5, &["frontend"], None),
    ]
};

/// Extra detail for a seeded task, keyed by title.
struct TaskDetail {
    title: &'static str,
    desc: &'static str,
    /// (id, title, done)
    subtasks: &'static [(&'static str, &'static str, bool)],
    /// (id, kind, text, user, time)
    activity: &'static [(&'static str, &'static str, &'static str, &'static str, &'static str)],
}

const TASK_DETAILS: &[TaskDetail] = &[
    TaskDetail {
        title: "User registration flow",
        desc: "Full registration with email verification.",
        subtasks: &[("s1", "Form UI", true), ("s2", "Validation", true)],
        activity: &[],
    },
    TaskDetail {
        title: "JWT auth middleware",
        desc: "Token generation and refresh logic.",
        subtasks: &[],
        activity: &[],
    },
    TaskDetail {
        title: "Dashboard widget layout",
        desc: "Drag-and-drop widget-based layout.",
        subtasks: &[("s3", "Widget grid", false), ("s4", "Charts", false), ("s5", "Filters", false)],
        activity: &[("a1", "created", "Task created", "Alice", "5d ago")],
    },
    TaskDetail {
        title: "API rate limiting middleware",
        desc: "Token-bucket rate limiting.",
        subtasks: &[],
        activity: &[],
    },
    TaskDetail {
        title: "OAuth 2.0 login integration",
        desc: "Integrate Google + GitHub OAuth.",
        subtasks: &[("s6", "Google OAuth", true), ("s7", "GitHub OAuth", false)],
        activity: &[("a2", "status", "Moved to In Progress", "Alice", "2d ago")],
    },
    TaskDetail {
        title: "User settings & preferences",
        desc: "Avatar and notification settings.",
        subtasks: &[("s8", "Avatar upload", true), ("s9", "Preferences panel", false)],
        activity: &[],
    },
    TaskDetail {
        title: "CI/CD pipeline with GitHub Actions",
        desc: "Automated build and deploy.",
        subtasks: &[
            ("s10", "Build workflow", true),
            ("s11", "Deploy workflow", true),
            ("s12", "Staging env", false),
        ],
        activity: &[("a3", "status", "Ready for test", "Dave", "1d ago")],
    },
    TaskDetail {
        title: "Memory leak in WebSocket handler",
        desc: "Connections not closed properly.",
        subtasks: &[("s13", "Reproduce", true), ("s14", "Fix", true)],
        activity: &[],
    },
    TaskDetail {
        title: "Stripe payment checkout",
        desc: "Stripe integration.",
        subtasks: &[("s15", "Payment intent", true), ("s16", "Webhooks", true), ("s17", "Refunds", true)],
        activity: &[("a4", "status", "Ready to deploy", "Carol", "6h ago")],
    },
    TaskDetail {
        title: "Fix 404 on production page refresh",
        desc: "SPA routing fix in nginx.",
        subtasks: &[("s18", "nginx config", true)],
        activity: &[],
    },
];

impl TaskDetail {
    fn apply(&self, task: &mut Task) {
        task.desc = self.desc.to_string();
        task.subtasks = self
            .subtasks
            .iter()
            .map(|&(id, title, done)| Subtask::new(id, title, done))
            .collect();
        task.activity = self
            .activity
            .iter()
            .map(|&(id, kind, text, user, time)| ActivityEntry {
                id: id.to_string(),
                kind: ActivityKind::from(kind.to_string()),
                text: text.to_string(),
                user: user.to_string(),
                time: time.to_string(),
                extra: Default::default(),
            })
            .collect();
    }
}

/// (type, title, status, priority, assignee, tags, due, description)
type SeedIssue = (
    IssueType,
    &'static str,
    IssueStatus,
    Priority,
    &'static str,
    &'static [&'static str],
    Option<&'static str>,
    &'static str,
);

const ISSUES: &[SeedIssue] = {
    use IssueStatus::*;
    use IssueType::*;
    use Priority::*;
    &[
        (Bug, "App crashes on logout with expired token", New, Critical, "alice", &["auth", "critical"], Some("2024-10-05"), "Uncaught TypeError when JWT expires."),
        (Bug, "Memory leak in dashboard charts", New, High, "bob", &["dashboard"], Some("2024-10-08"), "Charts re-render continuously."),
        (Bug, "Data not persisting after page refresh", InProgress, High, "carol", &["frontend"], Some("2024-10-06"), "Form data cleared on hard refresh."),
        (Bug, "Login session timeout not handled", Reopened, Critical, "dave", &["auth", "ux"], Some("2024-10-04"), "Redirect loop found."),
        (Bug, "Broken nav link in sidebar", Done, Normal, "alice", &["frontend"], None, "Fixed."),
        (Enhancement, "Dark / light theme toggle", New, Normal, "bob", &["ui", "theme"], None, "Allow users to switch themes."),
        (Enhancement, "Fuzzy search across all entities", InProgress, High, "carol", &["search", "ux"], Some("2024-10-12"), "Current search is exact match only."),
        (Enhancement, "Export tasks to CSV / PDF", New, Low, "dave", &["export"], None, "Users need to export task lists."),
        (Question, "API pagination: cursor vs offset?", New, Normal, "alice", &["api", "docs"], None, "Docs unclear about pagination."),
        (Question, "File upload size limit strategy?", New, Low, "bob", &["upload"], None, "Client-side vs server-side?"),
    ]
};

/// (name, color, progress, description, linked task titles)
const EPICS: &[(&str, &str, u8, &str, &[&str])] = &[
    (
        "Authentication Module",
        "#6366f1",
        80,
        "Full auth system.",
        &[
            "User registration flow",
            "JWT auth middleware",
            "Fix CORS on /auth endpoints",
            "Password reset via email link",
            "Role-based access control",
            "Google OAuth sign-in",
        ],
    ),
    (
        "Dashboard Redesign",
        "#0891b2",
        40,
        "Widget-based dashboard.",
        &["Dashboard widget layout", "User profile page", "User settings & preferences"],
    ),
    (
        "API Integration",
        "#a855f7",
        10,
        "Third-party API work.",
        &["API rate limiting middleware", "Stripe payment checkout", "DB indexing optimization"],
    ),
];

fn date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Seed the remote store if its `sprints` collection is empty.
///
/// Returns true if seeding was performed.
pub async fn init_database(remote: &RemoteStore) -> Result<bool, RemoteError> {
    let sprints = remote.list::<Sprint>().await?;
    if !sprints.is_empty() {
        tracing::debug!(count = sprints.len(), "remote store already seeded");
        return Ok(false);
    }
    seed_database(remote).await?;
    Ok(true)
}

/// Populate the remote store with demo sprints, tasks, issues and epics.
pub async fn seed_database(remote: &RemoteStore) -> Result<(), RemoteError> {
    tracing::info!("seeding remote store");

    let mut sprint_ids = Vec::with_capacity(SPRINTS.len());
    for seed in &SPRINTS {
        let mut sprint = Sprint::new(String::new(), seed.name.to_string());
        sprint.start_date = date(seed.start);
        sprint.end_date = date(seed.end);
        sprint.status = seed.status;
        sprint.goal = seed.goal.to_string();
        sprint.total_points = seed.points;
        sprint_ids.push(remote.create(&sprint).await?.id);
    }

    let tasks: Vec<Task> = TASKS
        .iter()
        .map(|&(sprint, task_type, title, status, priority, assignee, points, tags, due)| {
            let mut task = Task::new(String::new(), title.to_string());
            task.task_type = task_type;
            task.status = status;
            task.priority = priority;
            task.sprint_id = sprint.and_then(|i| sprint_ids.get(i).cloned());
            task.assignee_id = assignee.map(str::to_string);
            task.points = points;
            task.tags = strings(tags);
            task.due_date = due.and_then(date);
            if let Some(detail) = TASK_DETAILS.iter().find(|d| d.title == title) {
                detail.apply(&mut task);
            }
            task
        })
        .collect();
    let created = try_join_all(tasks.iter().map(|t| remote.create(t))).await?;
    let title_to_id: HashMap<&str, &str> = created
        .iter()
        .map(|t| (t.title.as_str(), t.id.as_str()))
        .collect();

    let issues: Vec<Issue> = ISSUES
        .iter()
        .map(|&(issue_type, title, status, priority, assignee, tags, due, desc)| {
            let mut issue = Issue::new(String::new(), title.to_string());
            issue.issue_type = issue_type;
            issue.status = status;
            issue.priority = priority;
            issue.assignee_id = Some(assignee.to_string());
            issue.tags = strings(tags);
            issue.due_date = due.and_then(date);
            issue.desc = desc.to_string();
            issue
        })
        .collect();
    try_join_all(issues.iter().map(|i| remote.create(i))).await?;

    let epics: Vec<Epic> = EPICS
        .iter()
        .map(|&(name, color, progress, desc, titles)| {
            let mut epic = Epic::new(String::new(), name.to_string());
            epic.color = color.to_string();
            epic.progress_pct = progress;
            epic.desc = desc.to_string();
            epic.linked_task_ids = titles
                .iter()
                .filter_map(|title| title_to_id.get(title).map(|id| id.to_string()))
                .collect();
            epic
        })
        .collect();
    try_join_all(epics.iter().map(|e| remote.create(e))).await?;

    tracing::info!(
        sprints = sprint_ids.len(),
        tasks = created.len(),
        issues = issues.len(),
        epics = epics.len(),
        "seeded remote store"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seeds_only_once() {
        let transport = Arc::new(MemoryTransport::new());
        let remote = RemoteStore::new(transport.clone());

        assert!(init_database(&remote).await.unwrap());
        assert_eq!(transport.len("sprints"), 2);
        assert_eq!(transport.len("tasks"), TASKS.len());
        assert_eq!(transport.len("issues"), ISSUES.len());
        assert_eq!(transport.len("epics"), EPICS.len());

        assert!(!init_database(&remote).await.unwrap());
        assert_eq!(transport.len("sprints"), 2);
    }

    #[tokio::test]
    async fn test_seeded_links_resolve() {
        let remote = RemoteStore::new(Arc::new(MemoryTransport::new()));
        init_database(&remote).await.unwrap();

        let sprints = remote.list::<Sprint>().await.unwrap();
        let tasks = remote.list::<Task>().await.unwrap();
        let epics = remote.list::<Epic>().await.unwrap();

        let active = sprints
            .iter()
            .find(|s| s.status == SprintStatus::Active)
            .unwrap();
        assert_eq!(
            tasks
                .iter()
                .filter(|t| t.sprint_id.as_deref() == Some(active.id.as_str()))
                .count(),
            8
        );
        assert_eq!(tasks.iter().filter(|t| t.sprint_id.is_none()).count(), 3);

        let auth = epics.iter().find(|e| e.name == "Authentication Module").unwrap();
        assert_eq!(auth.linked_task_ids.len(), 6);
        assert!(
            auth.linked_task_ids
                .iter()
                .all(|id| tasks.iter().any(|t| &t.id == id))
        );
    }

    #[tokio::test]
    async fn test_seeded_tasks_carry_details() {
        let transport = Arc::new(MemoryTransport::new());
        let remote = RemoteStore::new(transport.clone());
        init_database(&remote).await.unwrap();

        let tasks = remote.list::<Task>().await.unwrap();
        let widget = tasks
            .iter()
            .find(|t| t.title == "Dashboard widget layout")
            .unwrap();
        assert_eq!(widget.desc, "Drag-and-drop widget-based layout.");
        assert_eq!(widget.subtasks.len(), 3);
        assert_eq!(widget.activity.len(), 1);
        assert_eq!(widget.activity[0].kind, ActivityKind::Created);

        // Arrays travel as JSON strings
        let raw = transport.record("tasks", &widget.id).unwrap();
        assert!(raw["subtasks"].as_str().unwrap().contains("Widget grid"));

        let plain = tasks.iter().find(|t| t.title == "DB indexing optimization").unwrap();
        assert!(plain.subtasks.is_empty());
        assert_eq!(plain.desc, "");
    }
}
