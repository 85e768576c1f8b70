//! Text rendering of the admin dashboard: user table, monthly series and
//! system gauges.

use unicode_width::UnicodeWidthStr;

use crate::api::{MonthlyActivity, MonthlySignups, PendingBook, SystemStats, UserRecord, month_label};

const BAR_WIDTH: usize = 30;

/// One percentage bar of the system status panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub title: &'static str,
    pub percent: f64,
    pub description: String,
}

impl Gauge {
    pub fn new(title: &'static str, value: f64, description: String) -> Self {
        let percent = if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            title,
            percent,
            description,
        }
    }

    pub fn bar(&self, width: usize) -> String {
        let filled = ((self.percent / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
    }
}

pub fn system_gauges(stats: &SystemStats) -> [Gauge; 3] {
    [
        Gauge::new(
            "Server Load (Simulated)",
            stats.server_load,
            format!("{}% CPU utilization.", stats.server_load),
        ),
        Gauge::new(
            "Database Connections (Simulated)",
            stats.db_connections,
            format!("{}% of connection pool used.", stats.db_connections),
        ),
        Gauge::new(
            "Storage Capacity",
            stats.storage_capacity,
            format!("{:.2}% of total storage used.", stats.storage_capacity),
        ),
    ]
}

pub fn render_gauges(gauges: &[Gauge]) -> String {
    let mut out = String::new();
    for gauge in gauges {
        out.push_str(&format!(
            "{}\n  {} {:>5.1}%\n  {}\n",
            gauge.title,
            gauge.bar(BAR_WIDTH),
            gauge.percent,
            gauge.description
        ));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub label: &'static str,
    pub count: u64,
}

pub fn signup_series(data: &[MonthlySignups]) -> Vec<SeriesPoint> {
    data.iter()
        .map(|d| SeriesPoint {
            label: month_label(d.month_start),
            count: d.signup_count,
        })
        .collect()
}

pub fn activity_series(data: &[MonthlyActivity]) -> Vec<SeriesPoint> {
    data.iter()
        .map(|d| SeriesPoint {
            label: month_label(d.month_start),
            count: d.read_count,
        })
        .collect()
}

/// Horizontal bar chart, bars scaled to the largest count.
pub fn render_series(title: &str, points: &[SeriesPoint]) -> String {
    let mut out = format!("{title}\n");
    if points.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }
    let label_width = points.iter().map(|p| p.label.width()).max().unwrap_or(0);
    let max = points.iter().map(|p| p.count).max().unwrap_or(0).max(1);
    for point in points {
        let len = (point.count * BAR_WIDTH as u64).div_ceil(max) as usize;
        out.push_str(&format!(
            "  {}{} {} {}\n",
            point.label,
            " ".repeat(label_width - point.label.width()),
            "#".repeat(len),
            point.count
        ));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub name: String,
    pub role: String,
    pub email: String,
    pub joined: String,
}

impl From<&UserRecord> for UserRow {
    fn from(user: &UserRecord) -> Self {
        Self {
            name: user.username().unwrap_or("N/A").to_string(),
            role: user.role_name().to_string(),
            email: user.email.clone().unwrap_or_default(),
            joined: user
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

pub fn render_users(users: &[UserRecord]) -> String {
    let rows: Vec<[String; 4]> = users
        .iter()
        .map(UserRow::from)
        .map(|r| [r.name, r.role, r.email, r.joined])
        .collect();
    render_table(["USER", "ROLE", "EMAIL", "JOINED"], &rows)
}

pub fn render_pending(books: &[PendingBook]) -> String {
    let rows: Vec<[String; 4]> = books
        .iter()
        .map(|b| {
            [
                b.id.to_string(),
                b.title.clone(),
                b.author.clone(),
                b.genre.join(", "),
            ]
        })
        .collect();
    render_table(["ID", "TITLE", "AUTHOR", "GENRE"], &rows)
}

fn render_table<const N: usize>(header: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = header.map(|h| h.width());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let format_row = |cells: [&str; N]| {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < N {
                line.push_str(&" ".repeat(widths[i] - cell.width() + 2));
            }
        }
        line.trim_end().to_string()
    };

    let mut out = format_row(header);
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row.each_ref().map(String::as_str)));
        out.push('\n');
    }
    out
}
