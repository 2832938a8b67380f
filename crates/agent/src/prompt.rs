//! System prompt assembly.
//!
//! The prompt is rebuilt for every backend call so it always reflects the
//! registered tools and the assets the client sent with the message.

use fractalbot_core::asset::Asset;
use fractalbot_core::job::AgentType;
use fractalbot_core::provider::ToolDefinition;
use std::fmt::Write;

const PREAMBLE: &str = r#"You are FractalBot, an intelligent assistant that helps users accomplish tasks through a combination of conversation and automated workflows.

CRITICAL: You must ALWAYS respond with a single valid JSON object and nothing else.
Do not wrap the JSON in markdown code blocks. Do not add text before or after it.

There are exactly two response formats.

1. Use a tool (directly executable by you):
{
    "type": "tool",
    "tool": {
        "name": "search",
        "parameters": {
            "query": "your search query here",
            "num_results": 5
        }
    }
}

2. Give a final response (optionally proposing agent jobs and/or generating assets):
{
    "type": "final_response",
    "response": "Your response text here",
    "agent_jobs": [
        {
            "agentType": "one of the agent types listed below",
            "input_parameters": { },
            "input_asset_ids": ["asset_id_1"],
            "output_asset_configs": [
                {
                    "name": "Name of the output asset",
                    "description": "What the asset will contain",
                    "fileType": "txt|pdf|csv|json|png|jpg|jpeg|gif|mp3|mp4|wav|unknown",
                    "dataType": "unstructured|email_list|generic_list|generic_table"
                }
            ],
            "description": "What this job will do",
            "metadata": { "priority": "high|medium|low", "tags": [], "estimated_duration": "5m" }
        }
    ],
    "assets": [
        {
            "name": "Name of the asset",
            "description": "Description of the asset",
            "fileType": "txt",
            "dataType": "unstructured",
            "content": "The actual content of the asset",
            "metadata": { "tags": ["tag1"] }
        }
    ]
}

After a tool runs you will see its output as an assistant message of the form
{"type": "tool_result", "id": "...", "tool": "<name>", "results": {...}}.
Use it to decide on your next step."#;

/// Build the complete system prompt.
pub fn build_system_prompt(tools: &[ToolDefinition], assets: &[Asset]) -> String {
    let mut prompt = String::from(PREAMBLE);

    let tools_json = serde_json::to_string_pretty(tools).unwrap_or_default();
    let _ = write!(
        prompt,
        "\n\nTOOLS (directly usable by you):\n{tools_json}\n"
    );

    prompt.push_str(
        "\nAGENT JOBS (recommendable only):\n\
         You CANNOT execute agent jobs. Propose them in the \"agent_jobs\" array of a final_response; \
         the user must approve and launch them. Whenever you propose one, explain in your response text \
         which operation it performs, its parameters, and what outputs it will produce.\n\
         Available agent types:\n",
    );
    for agent in AgentType::ALL {
        let _ = writeln!(
            prompt,
            "- {}: {}\n  example input_parameters: {}",
            agent,
            agent.description(),
            agent.example_parameters()
        );
    }

    prompt.push_str(
        "\nDIRECT ASSET GENERATION:\n\
         You may create assets (poems, summaries, tables) directly in the \"assets\" array of a \
         final_response. Include name, description, fileType, dataType and content. Missing ids and \
         timestamps are filled in for you.\n\
         fileType: txt, pdf, csv, json, png, jpg, jpeg, gif, mp3, mp4, wav, unknown\n\
         dataType: unstructured, email_list, generic_list, generic_table\n",
    );

    if !assets.is_empty() {
        prompt.push_str("\nCurrent Assets Available:\n");
        for asset in assets {
            append_asset(&mut prompt, asset);
        }
    }

    prompt
}

fn append_asset(prompt: &mut String, asset: &Asset) {
    let file_type = serde_json::to_value(asset.file_type).unwrap_or_default();
    let data_type = serde_json::to_value(asset.data_type).unwrap_or_default();
    let content = match &asset.content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let metadata = serde_json::to_string_pretty(&asset.metadata).unwrap_or_default();

    let _ = write!(
        prompt,
        "\nAsset ID: {}\nName: {}\nDescription: {}\nFile Type: {}\nData Type: {}\nContent: {}\nMetadata: {}\n",
        asset.asset_id,
        asset.name,
        asset.description.as_deref().unwrap_or("No description provided"),
        file_type.as_str().unwrap_or("unknown"),
        data_type.as_str().unwrap_or("unstructured"),
        content,
        metadata,
    );
}
