pub mod corpus;
pub mod llm;
