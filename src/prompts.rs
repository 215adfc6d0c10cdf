use crate::models::CompanyAnalysis;

pub const TOOL_EXTRACTION_SYSTEM: &str = "You are a tech researcher. Extract specific tool, library, platform, or service names from articles. Focus on actual products/tools that developers can use, not general concepts or features.";

pub fn tool_extraction_user(query: &str, content: &str) -> String {
    format!(
        r#"Query: {query}
Article Content:
{content}

Extract a list of specific tool/service names mentioned in this content that are relevant to "{query}".

Rules:
- Only include actual product names, not generic terms
- Focus on tools developers can directly use/implement
- Include both open source and commercial options
- Limit to the 5 most relevant tools
- Return just the tool names, one per line, no descriptions, numbering or bullets

Example format:
Supabase
PlanetScale
Railway
Appwrite
Nhost"#
    )
}

pub const TOOL_ANALYSIS_SYSTEM: &str = "You are analyzing developer tools and programming technologies. Focus on extracting information relevant to programmers and software developers. Pay special attention to programming languages, frameworks, APIs, SDKs, and development workflows. You always answer with a single JSON object and nothing else.";

pub fn tool_analysis_user(company_name: &str, content: &str) -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(CompanyAnalysis))
        .unwrap_or_default();
    format!(
        r#"Company/Tool: {company_name}
Website Content: {content}

Analyze this content from a developer's perspective and answer with one JSON object matching this schema:
{schema}

Field guidance:
- pricing_model: one of "Free", "Freemium", "Paid", "Enterprise" or "Unknown"
- is_open_source: true if open source, false if proprietary, null if the page does not say
- tech_stack: programming languages, frameworks, databases, APIs or technologies supported/used
- description: one sentence focusing on what this tool does for developers
- api_available: true if REST API, GraphQL, SDK or programmatic access is mentioned, null if unknown
- language_support: programming languages explicitly supported (e.g. Python, JavaScript, Go)
- integration_capabilities: tools/platforms it integrates with (e.g. GitHub, VS Code, Docker, AWS)

Use exactly these keys. Do not add commentary outside the JSON object."#
    )
}

pub const RECOMMENDATION_SYSTEM: &str = "You are a senior software engineer providing quick, concise tech recommendations. Keep responses brief and actionable - maximum 3-4 sentences total.";

pub fn recommendation_user(query: &str, company_data: &str) -> String {
    format!(
        r#"Developer Query: {query}
Tools/Technologies Analyzed: {company_data}

Provide a brief recommendation (3-4 sentences max) covering:
- Which tool is best and why
- Key cost/pricing consideration
- Main technical advantage

Be concise and direct - no long explanations needed."#
    )
}
