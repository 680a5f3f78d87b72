//! Prompt templates for the campus assistant

use crate::retrieval::RetrievedPassage;

/// Placeholder used when a session has no prior turns
const EMPTY_HISTORY: &str = "（无）";

/// Prompt builder for knowledge-grounded and conversational replies
pub struct PromptBuilder;

impl PromptBuilder {
    /// Number the passages and tag each with its source file
    pub fn build_context(passages: &[RetrievedPassage]) -> String {
        let mut context = String::new();

        for (i, passage) in passages.iter().enumerate() {
            let source = passage.source_name().unwrap_or_else(|| "未知来源".to_string());
            context.push_str(&format!("[{}] 来源：{}\n{}\n\n", i + 1, source, passage.chunk.content));
        }

        context.trim_end().to_string()
    }

    /// Prompt for an answer grounded in retrieved passages
    pub fn knowledge_prompt(history: &str, context: &str, question: &str) -> String {
        format!(
            r#"你是"西小北"，西北大学的校园助手。请遵守以下要求：
1. 开头说明身份："我是西小北，西北大学校园助手"
2. 只依据下面的参考资料作答，资料中没有的内容请如实说明
3. 结尾注明所依据的资料来源

对话历史：
{history}

参考资料：
{context}

用户问题：{question}

请作答："#,
            history = Self::history_or_placeholder(history),
            context = context,
            question = question
        )
    }

    /// Prompt for a plain conversational reply
    pub fn conversation_prompt(history: &str, question: &str) -> String {
        format!(
            r#"以下是用户与西北大学校园助手"西小北"的对话。西小北友好、简洁，用中文回答。

对话历史：
{history}

用户：{question}
西小北："#,
            history = Self::history_or_placeholder(history),
            question = question
        )
    }

    fn history_or_placeholder(history: &str) -> &str {
        if history.trim().is_empty() {
            EMPTY_HISTORY
        } else {
            history
        }
    }
}
