//! Assistant configuration returned for `assistant-request` webhooks.
//!
//! The prompt, voice and tool descriptions are product content. They are kept
//! as a template here and filled with tenant details, the caller's number and
//! the current time in the tenant's timezone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value as JsonValue};

use switchboard_core::TenantRecord;

const MODEL_PROVIDER: &str = "openai";
const VOICE_PROVIDER: &str = "11labs";
const TENANT_MODEL: &str = "gpt-4";
const TENANT_VOICE_ID: &str = "rzF2ITnIG6HbQ1aRdhAv";

/// Inputs to the assistant template.
#[derive(Debug, Clone)]
pub struct AssistantContext<'a> {
    pub tenant: &'a TenantRecord,
    pub caller: Option<&'a str>,
    /// Base URL the platform should call tools on.
    pub public_base_url: &'a str,
    pub now: DateTime<Utc>,
}

/// Tenant-specific assistant configuration.
pub fn render_assistant(ctx: &AssistantContext<'_>) -> JsonValue {
    let tenant = ctx.tenant;
    let tz = tenant_timezone(tenant);
    let local = ctx.now.with_timezone(&tz);
    let current_date_time = local.format("%A, %B %-d, %Y at %-I:%M %p").to_string();
    let current_date = local.format("%b %-d, %Y").to_string();
    let caller = ctx.caller.unwrap_or("Unknown");
    let name = &tenant.display_name;
    let id = tenant.id.as_str();

    let system_prompt = format!(
        "You are an AI receptionist for {name}.\n\
         \n\
         Current Date & Time: {current_date_time}\n\
         Today's Date: {current_date}\n\
         \n\
         Your responsibilities:\n\
         - Greet callers warmly and professionally\n\
         - Collect their name and phone number\n\
         - Check availability and book appointments\n\
         - Answer questions using only information you have access to\n\
         - Keep responses brief and natural\n\
         \n\
         Business Details:\n\
         - Name: {name}\n\
         - Timezone: {tz}\n\
         - Client ID: {id}\n\
         \n\
         Caller Information:\n\
         - Caller's phone number: {caller}\n\
         - Only mention this number to confirm it or when asked for a callback number\n\
         \n\
         When booking appointments:\n\
         1. Ask for their name and confirm their phone number\n\
         2. Ask for their preferred day, then time\n\
         3. Convert the request to ISO format in the {tz} timezone, using 24-hour times\n\
         4. Call check_availability for the whole day (e.g. start_date \"YYYY-MM-DDT00:00:00\", end_date \"YYYY-MM-DDT23:59:59\")\n\
         5. Offer the open slots naturally\n\
         6. Book the chosen slot with book_appointment using \"Appointment\" as the title\n\
         7. Confirm the booking details back to them\n\
         \n\
         Critical rules:\n\
         - Never mention tools, systems, databases or technical processes to callers\n\
         - Never make up services, prices or information\n\
         - Use tools in the background without narrating what you are doing\n\
         - Always use the client_id {id} when calling functions\n\
         \n\
         Always be polite and professional."
    );

    json!({
        "firstMessage": format!("Thank you for calling {}! How can I help you today?", name),
        "model": {
            "provider": MODEL_PROVIDER,
            "model": TENANT_MODEL,
            "messages": [{ "role": "system", "content": system_prompt }],
            "tools": tool_definitions(id, ctx.public_base_url),
        },
        "voice": { "provider": VOICE_PROVIDER, "voiceId": TENANT_VOICE_ID },
    })
}

/// Assistant used when no tenant owns the called number.
pub fn fallback_assistant() -> JsonValue {
    json!({
        "name": "Switchboard Agent",
        "firstMessage": "Hello! How can I help you today?",
        "model": {
            "provider": MODEL_PROVIDER,
            "model": "gpt-4o",
            "messages": [{ "role": "system", "content": "You are a helpful AI assistant." }],
        },
        "voice": { "provider": VOICE_PROVIDER, "voiceId": "paula" },
    })
}

fn tenant_timezone(tenant: &TenantRecord) -> Tz {
    let name = tenant.timezone_or_default();
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(tenant_id = %tenant.id, timezone = name, "Unknown timezone; using default");
        chrono_tz::America::Los_Angeles
    })
}

fn client_id_param(tenant_id: &str) -> JsonValue {
    json!({
        "type": "string",
        "description": format!("The client ID - always use {}", tenant_id),
        "default": tenant_id,
    })
}

fn tool(name: &str, description: &str, parameters: JsonValue, base_url: &str) -> JsonValue {
    json!({
        "type": "function",
        "async": false,
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        },
        "server": { "url": format!("{}/tools/{}", base_url, name) },
    })
}

fn tool_definitions(tenant_id: &str, base_url: &str) -> JsonValue {
    json!([
        tool(
            "find_or_create_contact",
            "Find or create a contact in the CRM. Use this after collecting the customer's name and phone number, before booking appointments.",
            json!({
                "type": "object",
                "properties": {
                    "client_id": client_id_param(tenant_id),
                    "name": { "type": "string", "description": "Customer's full name" },
                    "phone": { "type": "string", "description": "Customer's phone number" },
                    "email": { "type": "string", "description": "Customer's email address (optional)" },
                },
                "required": ["client_id", "phone"],
            }),
            base_url,
        ),
        tool(
            "check_availability",
            "Check available appointment slots for a date range. Use this when a customer asks about availability or wants to book an appointment.",
            json!({
                "type": "object",
                "properties": {
                    "client_id": client_id_param(tenant_id),
                    "start_date": { "type": "string", "description": "Start date in ISO format (e.g., 2025-10-05T00:00:00Z)" },
                    "end_date": { "type": "string", "description": "End date in ISO format (e.g., 2025-10-05T23:59:59Z)" },
                },
                "required": ["client_id", "start_date", "end_date"],
            }),
            base_url,
        ),
        tool(
            "book_appointment",
            "Book an appointment after checking availability and getting customer confirmation.",
            json!({
                "type": "object",
                "properties": {
                    "client_id": client_id_param(tenant_id),
                    "contact_id": { "type": "string", "description": "The CRM contact ID (get this from find_or_create_contact first)" },
                    "start_time": { "type": "string", "description": "Appointment start time in ISO format" },
                    "end_time": { "type": "string", "description": "Appointment end time in ISO format" },
                    "title": { "type": "string", "description": "Appointment title/service type" },
                },
                "required": ["client_id", "contact_id", "start_time", "end_time"],
            }),
            base_url,
        ),
    ])
}
