use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::types::{AgentInput, AgentPersona, PersonaType};
use crate::core::error::invalid;
use crate::core::llm::Provider;

const AGENT_COLUMNS: &str = "agent_id, name, description, system_prompt, target_model, provider, \
                             active, persona_type, created_at, updated_at";

/// A validated save payload with the provider family already resolved.
struct ResolvedAgent<'a> {
    input: &'a AgentInput,
    agent_id: &'a str,
    persona_type: PersonaType,
    provider: Option<Provider>,
}

fn resolve(input: &AgentInput) -> Result<ResolvedAgent<'_>> {
    let agent_id = input.agent_id.trim();
    let mut missing = Vec::new();
    if agent_id.is_empty() {
        missing.push("agent_id");
    }
    if input.name.trim().is_empty() {
        missing.push("name");
    }
    if input.system_prompt.trim().is_empty() {
        missing.push("system_prompt");
    }
    if input.target_model.trim().is_empty() {
        missing.push("target_model");
    }
    let persona_raw = input
        .persona_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if persona_raw.is_none() {
        missing.push("persona_type");
    }
    if !missing.is_empty() {
        return Err(invalid(format!("missing required fields: {}", missing.join(", "))));
    }

    let persona_raw = persona_raw.unwrap_or_default();
    let Some(persona_type) = PersonaType::parse(persona_raw) else {
        return Err(invalid(format!("unknown persona_type '{}'", persona_raw)));
    };

    // An explicit provider wins; otherwise the model prefix decides once, here.
    let provider = match input.provider.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match Provider::from_id(raw) {
            Some(p) => Some(p),
            None => return Err(invalid(format!("unknown provider '{}'", raw))),
        },
        _ => Provider::from_model(&input.target_model),
    };

    Ok(ResolvedAgent {
        input,
        agent_id,
        persona_type,
        provider,
    })
}

fn row_to_agent(row: &Row<'_>) -> rusqlite::Result<AgentPersona> {
    Ok(AgentPersona {
        agent_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        system_prompt: row.get(3)?,
        target_model: row.get(4)?,
        provider: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
        persona_type: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn query_agent(db: &Connection, agent_id: &str) -> Result<Option<AgentPersona>> {
    let sql = format!("SELECT {} FROM agents WHERE agent_id = ?1", AGENT_COLUMNS);
    Ok(db
        .query_row(&sql, params![agent_id], row_to_agent)
        .optional()?)
}

fn loaded(db: &Connection, agent_id: &str) -> Result<AgentPersona> {
    query_agent(db, agent_id)?
        .ok_or_else(|| anyhow::anyhow!("agent '{}' vanished after write", agent_id))
}

impl Store {
    pub async fn list_agents(&self) -> Result<Vec<AgentPersona>> {
        let db = self.db.lock().await;
        let sql = format!("SELECT {} FROM agents ORDER BY agent_id", AGENT_COLUMNS);
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_agent)?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentPersona>> {
        let db = self.db.lock().await;
        query_agent(&db, agent_id.trim())
    }

    /// Insert or update in place, keyed by `agent_id`.
    pub async fn save_agent(&self, input: &AgentInput) -> Result<AgentPersona> {
        let agent = resolve(input)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agents (agent_id, name, description, system_prompt, target_model,
                                 provider, active, persona_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(agent_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                system_prompt = excluded.system_prompt,
                target_model = excluded.target_model,
                provider = excluded.provider,
                active = excluded.active,
                persona_type = excluded.persona_type,
                updated_at = CURRENT_TIMESTAMP",
            params![
                agent.agent_id,
                agent.input.name.trim(),
                agent.input.description,
                agent.input.system_prompt,
                agent.input.target_model.trim(),
                agent.provider,
                agent.input.active as i32,
                agent.persona_type,
            ],
        )?;
        loaded(&db, agent.agent_id)
    }

    /// Insert only; an existing `agent_id` is an error.
    pub async fn create_agent(&self, input: &AgentInput) -> Result<AgentPersona> {
        let agent = resolve(input)?;
        let db = self.db.lock().await;
        if query_agent(&db, agent.agent_id)?.is_some() {
            return Err(invalid(format!("agent '{}' already exists", agent.agent_id)));
        }
        db.execute(
            "INSERT INTO agents (agent_id, name, description, system_prompt, target_model,
                                 provider, active, persona_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                agent.agent_id,
                agent.input.name.trim(),
                agent.input.description,
                agent.input.system_prompt,
                agent.input.target_model.trim(),
                agent.provider,
                agent.input.active as i32,
                agent.persona_type,
            ],
        )?;
        loaded(&db, agent.agent_id)
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM agents WHERE agent_id = ?1",
            params![agent_id.trim()],
        )?;
        Ok(rows > 0)
    }
}
