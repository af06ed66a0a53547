//! Authorization API client over Azure Resource Manager and Microsoft Graph

use crate::config::ArmConfig;
use crate::error::{parse_error_body, ArmError, Result};
use crate::token::{EnvToken, TokenSource};
use crate::wire::{self, Page};
use apim_access_core::{
    BackendError, BackendResult, DirectoryClient, Identity, LockClient, LockLevel, PrincipalKind,
    ResourceLock, RoleAssignment, RoleClient, RoleDefinition, RoleDefinitionRecord,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

const AUTHORIZATION_API_VERSION: &str = "2022-04-01";
const LOCKS_API_VERSION: &str = "2016-09-01";
const RESOURCE_API_VERSION: &str = "2022-08-01";

const ROLE_DEFINITIONS: &str = "providers/Microsoft.Authorization/roleDefinitions";
const ROLE_ASSIGNMENTS: &str = "providers/Microsoft.Authorization/roleAssignments";
const LOCKS: &str = "providers/Microsoft.Authorization/locks";

/// Which token audience a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Management,
    Graph,
}

/// Blocking REST client implementing every Authorization API client trait
pub struct ArmClient {
    config: ArmConfig,
    http: Client,
    management_token: Box<dyn TokenSource>,
    graph_token: Box<dyn TokenSource>,
}

impl ArmClient {
    pub fn new(
        config: ArmConfig,
        management_token: Box<dyn TokenSource>,
        graph_token: Box<dyn TokenSource>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ArmError::Client(e.to_string()))?;
        Ok(Self {
            config,
            http,
            management_token,
            graph_token,
        })
    }

    /// Tokens are read from the named environment variables on each request
    pub fn from_env(config: ArmConfig, management_var: &str, graph_var: &str) -> Result<Self> {
        Self::new(
            config,
            Box::new(EnvToken::new(management_var)),
            Box::new(EnvToken::new(graph_var)),
        )
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    // ── URL building ────────────────────────────────────────────────────────

    /// `{management}{path}?api-version={version}` with each path segment
    /// percent-encoded
    pub fn management_url(&self, path: &str, api_version: &str) -> Result<Url> {
        let mut url = endpoint_url(&self.config.management_endpoint, path)?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    pub fn graph_url(&self, path: &str) -> Result<Url> {
        endpoint_url(&self.config.graph_endpoint, path)
    }

    fn subscription_scope(&self) -> String {
        self.config.subscription_scope()
    }

    fn group_locks_path(&self, resource_group: &str) -> String {
        format!("{}/resourceGroups/{}/{}", self.subscription_scope(), resource_group, LOCKS)
    }

    // ── Transport ───────────────────────────────────────────────────────────

    fn bearer(&self, audience: Audience) -> Result<String> {
        match audience {
            Audience::Management => self.management_token.token(),
            Audience::Graph => self.graph_token.token(),
        }
    }

    /// Send one request and return `(status, body)`; a missing or non-JSON
    /// body reads as `Null`
    fn send(&self, request: RequestBuilder, audience: Audience, method: &Method, url: &str) -> Result<(u16, Value)> {
        let token = self.bearer(audience)?;
        debug!(%method, url, "Azure request");
        let resp = request.bearer_auth(&token).send().map_err(|source| ArmError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })?;
        let status = resp.status().as_u16();
        let body = if status == 204 {
            Value::Null
        } else {
            resp.json::<Value>().unwrap_or(Value::Null)
        };
        debug!(%method, url, status, "Azure response");
        Ok((status, body))
    }

    fn request(&self, method: Method, url: Url, query: &[(&str, String)], body: Option<&Value>, audience: Audience) -> Result<(u16, Value)> {
        let text = url.to_string();
        let mut builder = self.http.request(method.clone(), url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder, audience, &method, &text)
    }

    fn arm_get(&self, url: Url) -> Result<Value> {
        let (status, body) = self.request(Method::GET, url, &[], None, Audience::Management)?;
        success(status, body)
    }

    fn arm_put(&self, url: Url, body: &Value) -> Result<Value> {
        let (status, body) = self.request(Method::PUT, url, &[], Some(body), Audience::Management)?;
        success(status, body)
    }

    fn arm_delete(&self, url: Url) -> Result<()> {
        let (status, body) = self.request(Method::DELETE, url, &[], None, Audience::Management)?;
        success(status, body).map(|_| ())
    }

    /// Follow `nextLink` / `@odata.nextLink` until the listing is complete
    fn list_all(&self, url: Url, query: &[(&str, String)], audience: Audience) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let (status, body) = self.request(Method::GET, url, query, None, audience)?;
        let mut page: Page = decode_page(success(status, body)?)?;

        loop {
            items.append(&mut page.value);
            let Some(next) = page.next_link.take() else {
                break;
            };
            let next = Url::parse(&next).map_err(|e| ArmError::Decode(format!("next link {}: {}", next, e)))?;
            let (status, body) = self.request(Method::GET, next, &[], None, audience)?;
            page = decode_page(success(status, body)?)?;
        }
        Ok(items)
    }

    // ── Role helpers ────────────────────────────────────────────────────────

    fn list_assignments(&self, scope: &str, filter: Option<String>) -> Result<Vec<RoleAssignment>> {
        let url = self.management_url(&format!("{}/{}", scope, ROLE_ASSIGNMENTS), AUTHORIZATION_API_VERSION)?;
        let query: Vec<(&str, String)> = filter.into_iter().map(|f| ("$filter", f)).collect();
        let sub = self.subscription_scope();
        self.list_all(url, &query, Audience::Management)?
            .into_iter()
            .map(|value| wire::parse_assignment(&sub, value))
            .collect()
    }

    /// First definition listed at `scope` under `filter` whose name matches
    /// exactly; the server-side name filter ignores case
    fn list_definitions(&self, scope: &str, filter: String, name: &str) -> Result<Option<RoleDefinitionRecord>> {
        let url = self.management_url(&format!("{}/{}", scope, ROLE_DEFINITIONS), AUTHORIZATION_API_VERSION)?;
        let sub = self.subscription_scope();
        let records = self
            .list_all(url, &[("$filter", filter)], Audience::Management)?
            .into_iter()
            .map(|value| wire::parse_definition(&sub, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(records.into_iter().find(|r| r.name() == name))
    }

    /// Turn a bare GUID into a full id; full ids pass through
    fn definition_path(&self, id: &str) -> String {
        if id.starts_with('/') {
            id.to_string()
        } else {
            wire::canonical_definition_id(&self.subscription_scope(), id)
        }
    }

    fn put_definition(&self, path: &str, definition: &RoleDefinition) -> BackendResult<RoleDefinitionRecord> {
        let url = self.management_url(path, AUTHORIZATION_API_VERSION)?;
        let body = self.arm_put(url, &wire::definition_body(definition))?;
        Ok(wire::parse_definition(&self.subscription_scope(), body)?)
    }
}

fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| ArmError::Client(format!("endpoint {}: {}", base, e)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ArmError::Client(format!("endpoint {} cannot take a path", base)))?;
        segments.pop_if_empty();
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}

fn success(status: u16, body: Value) -> Result<Value> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        let (code, message) = parse_error_body(&body);
        Err(ArmError::Status { status, code, message })
    }
}

fn decode_page(body: Value) -> Result<Page> {
    serde_json::from_value(body).map_err(|e| ArmError::Decode(format!("list page: {}", e)))
}

/// Exactly one match is usable; none or several is a miss
fn single<T>(mut matches: Vec<T>, name: &str, kind: PrincipalKind) -> Option<T> {
    match matches.len() {
        1 => matches.pop(),
        0 => None,
        n => {
            warn!(name, %kind, matches = n, "directory lookup is ambiguous");
            None
        }
    }
}

impl DirectoryClient for ArmClient {
    fn find_principal(&self, name: &str, kind: PrincipalKind) -> BackendResult<Option<Identity>> {
        let literal = wire::odata_literal(name);
        let (path, filter, select) = match kind {
            PrincipalKind::User => (
                "v1.0/users",
                format!("userPrincipalName eq {} or mail eq {}", literal, literal),
                "id,displayName,userPrincipalName",
            ),
            PrincipalKind::Group => ("v1.0/groups", format!("displayName eq {}", literal), "id,displayName"),
        };

        let url = self.graph_url(path)?;
        let query = [("$filter", filter), ("$select", select.to_string())];
        let matches = self
            .list_all(url, &query, Audience::Graph)?
            .into_iter()
            .map(|value| wire::parse_principal(kind, value))
            .collect::<Result<Vec<_>>>()?;

        Ok(single(matches, name, kind))
    }
}

impl RoleClient for ArmClient {
    fn find_role_definition(&self, name: &str, scope: Option<&str>) -> BackendResult<Option<RoleDefinitionRecord>> {
        let by_name = format!("roleName eq {}", wire::odata_literal(name));
        match scope {
            Some(scope) => Ok(self.list_definitions(scope, by_name, name)?),
            None => {
                let sub = self.subscription_scope();
                if let Some(record) = self.list_definitions(&sub, by_name, name)? {
                    return Ok(Some(record));
                }
                // Custom roles assignable only below the subscription are
                // listed at subscription scope only under atScopeAndBelow()
                debug!(role = name, "not listed at subscription scope, searching below it");
                Ok(self.list_definitions(&sub, "atScopeAndBelow()".to_string(), name)?)
            }
        }
    }

    fn get_role_definition(&self, id: &str) -> BackendResult<Option<RoleDefinitionRecord>> {
        let url = self.management_url(&self.definition_path(id), AUTHORIZATION_API_VERSION)?;
        match self.arm_get(url) {
            Ok(body) => Ok(Some(wire::parse_definition(&self.subscription_scope(), body)?)),
            Err(err) => match BackendError::from(err) {
                e if e.is_not_found() => Ok(None),
                e => Err(e),
            },
        }
    }

    fn create_role_definition(&self, definition: &RoleDefinition) -> BackendResult<RoleDefinitionRecord> {
        let guid = wire::definition_guid(&definition.name);
        let path = wire::canonical_definition_id(&self.subscription_scope(), &guid.to_string());
        let record = self.put_definition(&path, definition)?;
        info!(role = %definition.name, id = %record.id, "role definition written");
        Ok(record)
    }

    fn update_role_definition(&self, id: &str, definition: &RoleDefinition) -> BackendResult<RoleDefinitionRecord> {
        self.put_definition(&self.definition_path(id), definition)
    }

    fn delete_role_definition(&self, id: &str) -> BackendResult<()> {
        let url = self.management_url(&self.definition_path(id), AUTHORIZATION_API_VERSION)?;
        Ok(self.arm_delete(url)?)
    }

    fn list_assignments_for_principal(&self, principal_id: &str, include_inherited: bool) -> BackendResult<Vec<RoleAssignment>> {
        let literal = wire::odata_literal(principal_id);
        let filter = if include_inherited {
            format!("assignedTo({})", literal)
        } else {
            format!("principalId eq {}", literal)
        };
        Ok(self.list_assignments(&self.subscription_scope(), Some(filter))?)
    }

    fn list_assignments_for_role(&self, role_definition_id: &str) -> BackendResult<Vec<RoleAssignment>> {
        let mut assignments = self.list_assignments(&self.subscription_scope(), None)?;
        assignments.retain(|a| wire::same_definition(&a.role_definition_id, role_definition_id));
        Ok(assignments)
    }

    fn create_assignment(&self, principal: &Identity, role_definition_id: &str, scope: &str) -> BackendResult<RoleAssignment> {
        let guid = wire::assignment_guid(&principal.id, role_definition_id, scope);
        let path = format!("{}/{}/{}", scope, ROLE_ASSIGNMENTS, guid);
        let url = self.management_url(&path, AUTHORIZATION_API_VERSION)?;
        let definition_id = wire::canonical_definition_id(&self.subscription_scope(), role_definition_id);

        let body = self.arm_put(url, &wire::assignment_body(principal, &definition_id))?;
        Ok(wire::parse_assignment(&self.subscription_scope(), body)?)
    }

    fn delete_assignment(&self, assignment_id: &str) -> BackendResult<()> {
        let url = self.management_url(assignment_id, AUTHORIZATION_API_VERSION)?;
        Ok(self.arm_delete(url)?)
    }

    fn delete_assignment_by_binding(&self, principal_id: &str, role_name: &str, scope: &str) -> BackendResult<()> {
        let role = self
            .find_role_definition(role_name, Some(scope))?
            .ok_or_else(|| BackendError::not_found(format!("role {} at {}", role_name, scope)))?;

        let filter = format!("principalId eq {}", wire::odata_literal(principal_id));
        let bound: Vec<RoleAssignment> = self
            .list_assignments(scope, Some(filter))?
            .into_iter()
            .filter(|a| wire::same_definition(&a.role_definition_id, &role.id) && a.scope.eq_ignore_ascii_case(scope))
            .collect();

        if bound.is_empty() {
            return Err(BackendError::not_found(format!(
                "no assignment of {} to {} at {}",
                role_name, principal_id, scope
            )));
        }
        for assignment in bound {
            self.delete_assignment(&assignment.id)?;
        }
        Ok(())
    }

    fn resource_exists(&self, resource_id: &str) -> BackendResult<bool> {
        let url = self.management_url(resource_id, RESOURCE_API_VERSION)?;
        match self.arm_get(url) {
            Ok(_) => Ok(true),
            Err(err) => match BackendError::from(err) {
                e if e.is_not_found() => Ok(false),
                e => Err(e),
            },
        }
    }
}

impl LockClient for ArmClient {
    fn list_locks(&self, resource_group: &str) -> BackendResult<Vec<ResourceLock>> {
        let url = self.management_url(&self.group_locks_path(resource_group), LOCKS_API_VERSION)?;
        let locks = self
            .list_all(url, &[], Audience::Management)?
            .into_iter()
            .map(wire::parse_lock)
            .collect::<Result<Vec<_>>>()?;

        // The group listing also returns locks on resources inside it
        Ok(locks
            .into_iter()
            .filter(|l| l.id.as_deref().map_or(true, |id| wire::is_group_level_lock(id, resource_group)))
            .collect())
    }

    fn create_lock(&self, resource_group: &str, name: &str, level: LockLevel, notes: Option<&str>) -> BackendResult<ResourceLock> {
        let path = format!("{}/{}", self.group_locks_path(resource_group), name);
        let url = self.management_url(&path, LOCKS_API_VERSION)?;
        let body = self.arm_put(url, &wire::lock_body(level, notes))?;
        Ok(wire::parse_lock(body)?)
    }

    fn delete_lock(&self, resource_group: &str, name: &str) -> BackendResult<()> {
        let path = format!("{}/{}", self.group_locks_path(resource_group), name);
        let url = self.management_url(&path, LOCKS_API_VERSION)?;
        Ok(self.arm_delete(url)?)
    }
}
