//! Route table
//!
//! Static mapping from application paths to the roles allowed to view them,
//! built once at startup from the routing configuration.

use crate::identity::Role;
use cabdash_core::{CabError, CabResult, ErrorContext, RouteConfig};
use std::collections::BTreeSet;

/// Who may view a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, logged in or not
    Public,
    /// Any logged-in role
    Authenticated,
    /// Only the listed roles
    Roles(BTreeSet<Role>),
}

impl Access {
    pub fn roles(roles: &[Role]) -> Self {
        Access::Roles(roles.iter().copied().collect())
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public)
    }

    /// Whether `role` passes this route's allow-list
    pub fn allows(&self, role: Role) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(roles) => roles.contains(&role),
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::Authenticated => write!(f, "any role"),
            Access::Roles(roles) => {
                let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}

/// Policy entry for one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub pattern: String,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    segments: Vec<Segment>,
    policy: RoutePolicy,
}

/// Ordered set of routes; the first matching pattern wins
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configuration, rejecting unknown roles,
    /// relative patterns and duplicates
    pub fn from_config(routes: &[RouteConfig]) -> CabResult<Self> {
        let mut table = Self::new();
        for route in routes {
            let access = if route.public {
                if !route.roles.is_empty() {
                    return Err(route_error(
                        &route.path,
                        "a public route cannot also list roles",
                    ));
                }
                Access::Public
            } else if route.roles.is_empty() {
                Access::Authenticated
            } else {
                let roles = route
                    .roles
                    .iter()
                    .map(|name| name.parse::<Role>())
                    .collect::<Result<BTreeSet<_>, _>>()
                    .map_err(|e| route_error(&route.path, &e))?;
                Access::Roles(roles)
            };
            table.insert(&route.path, access)?;
        }
        Ok(table)
    }

    /// Append a route
    pub fn insert(&mut self, pattern: &str, access: Access) -> CabResult<()> {
        if !pattern.starts_with('/') {
            return Err(route_error(pattern, "route patterns must start with '/'"));
        }
        let pattern = normalize_path(pattern).to_string();
        if self.routes.iter().any(|r| r.policy.pattern == pattern) {
            return Err(route_error(&pattern, "route declared twice"));
        }

        let segments = split(&pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(_) => Segment::Param,
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        self.routes.push(RouteEntry {
            segments,
            policy: RoutePolicy { pattern, access },
        });
        Ok(())
    }

    /// Builder form of [`RouteTable::insert`]
    pub fn with_route(mut self, pattern: &str, access: Access) -> CabResult<Self> {
        self.insert(pattern, access)?;
        Ok(self)
    }

    /// Policy of the first route matching `path`; query and fragment are ignored
    pub fn lookup(&self, path: &str) -> Option<&RoutePolicy> {
        let requested: Vec<&str> = split(normalize_path(path)).collect();
        self.routes
            .iter()
            .find(|route| matches(&route.segments, &requested))
            .map(|route| &route.policy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.routes.iter().map(|route| &route.policy)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Strip query string, fragment and trailing slashes
pub fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = path[..end].trim_end_matches('/');
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Whether two paths address the same page; empty segments, query and fragment are ignored
pub fn same_path(a: &str, b: &str) -> bool {
    split(normalize_path(a)).eq(split(normalize_path(b)))
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn matches(pattern: &[Segment], requested: &[&str]) -> bool {
    pattern.len() == requested.len()
        && pattern
            .iter()
            .zip(requested)
            .all(|(segment, part)| match segment {
                Segment::Param => true,
                Segment::Literal(literal) => literal == part,
            })
}

fn route_error(pattern: &str, reason: &str) -> CabError {
    CabError::Config {
        message: format!("Invalid route '{}': {}", pattern, reason),
        source: None,
        context: ErrorContext::new("route_table")
            .with_operation("build")
            .with_metadata("pattern", pattern)
            .with_suggestion("Roles must be one of ADMIN, DRIVER, CUSTOMER"),
    }
}
