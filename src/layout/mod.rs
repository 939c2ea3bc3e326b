//! Dashboard chrome shared by every admin and employee page.
//!
//! Which navigation is shown depends only on the request path: anything under
//! `/admin` gets the admin sidebar, everything else the employee one.

use serde::Serialize;
use tera::{Context, Tera};
use utoipa::ToSchema;

pub mod pages;

#[cfg(test)]
mod tests;

pub const SIGN_IN_PATH: &str = "/signInUp";
pub const SIGN_OUT_PATH: &str = "/signout";
const LOADING: &str = "Loading...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Admin,
    Employee,
}

impl Area {
    pub fn from_path(path: &str) -> Self {
        if path.starts_with("/admin") {
            Area::Admin
        } else {
            Area::Employee
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Area::Admin => "Admin Dashboard",
            Area::Employee => "Employee Dashboard",
        }
    }

    pub fn home(self) -> &'static str {
        match self {
            Area::Admin => "/admin/dashboard",
            Area::Employee => "/employee/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NavIcon {
    Dashboard,
    Clipboard,
    Users,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
    pub icon: NavIcon,
    pub active: bool,
}

/// Matches the current path itself or anything beneath it.
pub fn is_active(href: &str, path: &str) -> bool {
    path == href
        || path
            .strip_prefix(href)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn sidebar_links(area: Area, current_path: &str) -> Vec<NavLink> {
    let entries: &[(&'static str, &'static str, NavIcon)] = match area {
        Area::Admin => &[
            ("Dashboard", "/admin/dashboard", NavIcon::Dashboard),
            ("Leave Requests", "/admin/leave-requests", NavIcon::Clipboard),
            ("Manage Employees", "/admin/users", NavIcon::Users),
        ],
        Area::Employee => &[
            ("Dashboard", "/employee/dashboard", NavIcon::Dashboard),
            ("Request Leave", "/employee/request-leave", NavIcon::Clipboard),
        ],
    };

    entries
        .iter()
        .map(|&(label, href, icon)| NavLink {
            label,
            href,
            icon,
            active: is_active(href, current_path),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shell {
    pub area: Area,
    pub title: &'static str,
    pub current_path: String,
    /// `None` while the profile could not be fetched
    pub user_name: Option<String>,
    pub sidebar_open: bool,
    pub links: Vec<NavLink>,
    pub sign_out: &'static str,
}

impl Shell {
    pub fn new(path: &str, user_name: Option<String>, sidebar_open: bool) -> Self {
        let area = Area::from_path(path);
        Self {
            area,
            title: area.title(),
            current_path: path.to_string(),
            user_name,
            sidebar_open,
            links: sidebar_links(area, path),
            sign_out: SIGN_OUT_PATH,
        }
    }

    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(LOADING)
    }

    fn heading(&self) -> &str {
        self.links
            .iter()
            .find(|l| l.active)
            .map(|l| l.label)
            .unwrap_or(self.title)
    }
}

/// Page templates, parsed once at startup. `.html` templates are autoescaped.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("shell.html", include_str!("../../templates/shell.html")),
            ("sign_in.html", include_str!("../../templates/sign_in.html")),
        ])?;
        Ok(Self { tera })
    }

    pub fn render_shell(&self, shell: &Shell) -> Result<String, tera::Error> {
        let mut context = Context::from_serialize(shell)?;
        context.insert("displayName", shell.display_name());
        context.insert("heading", shell.heading());
        self.tera.render("shell.html", &context)
    }

    pub fn render_sign_in(&self) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("login_url", "/user/login");
        context.insert("admin_home", Area::Admin.home());
        context.insert("employee_home", Area::Employee.home());
        self.tera.render("sign_in.html", &context)
    }
}
