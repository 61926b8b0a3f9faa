//! Persona registry: the fixed catalog of answering styles.
//!
//! Each persona is a long-form instruction block compiled into the binary.
//! The texts are `&'static str`, so they are immutable for the lifetime of the
//! process and can be read from any task without synchronization.
//!
//! Personas arrive from the storage layer as free-form strings. Parsing is
//! lenient: anything unrecognized resolves to [`PersonaId::Professor`].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// The name every persona answers as. Prompts end with `"{ASSISTANT_NAME}:"`
/// and backends sometimes echo that label back.
pub const ASSISTANT_NAME: &str = "Lyria";

/// Identifier of a persona in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    /// Educational mode. Also the fallback for unknown ids.
    #[default]
    Professor,
    /// Corporate / business analysis mode.
    #[serde(rename = "empresarial")]
    Corporate,
    /// Social and behavioural support mode.
    Social,
}

impl PersonaId {
    /// Every persona in catalog order.
    pub fn all() -> &'static [PersonaId] {
        &[PersonaId::Professor, PersonaId::Corporate, PersonaId::Social]
    }

    /// The wire name stored by the persistence layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::Professor => "professor",
            PersonaId::Corporate => "empresarial",
            PersonaId::Social => "social",
        }
    }

    /// Short human-readable summary, used by listings.
    pub fn summary(&self) -> &'static str {
        match self {
            PersonaId::Professor => {
                "Educational: clear, didactic explanations with concrete examples"
            }
            PersonaId::Corporate => "Corporate: direct analysis focused on results and ROI",
            PersonaId::Social => {
                "Social: empathetic, practical advice on relationships and wellbeing"
            }
        }
    }

    /// Lenient parse: unknown or empty input falls back to the default persona.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// The persona's instruction text.
    pub fn text(&self) -> &'static str {
        persona_text(*self)
    }
}

impl FromStr for PersonaId {
    type Err = UnknownPersona;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professor" => Ok(PersonaId::Professor),
            "empresarial" | "corporate" => Ok(PersonaId::Corporate),
            "social" => Ok(PersonaId::Social),
            _ => Err(UnknownPersona(s.to_string())),
        }
    }
}

/// Stored ids deserialize leniently, like [`PersonaId::parse_or_default`].
impl<'de> Deserialize<'de> for PersonaId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PersonaId::parse_or_default(&raw))
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by strict parsing when the id isn't in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown persona '{0}' (expected professor, empresarial or social)")]
pub struct UnknownPersona(pub String);

/// Resolve a persona id to its instruction text.
pub fn persona_text(id: PersonaId) -> &'static str {
    match id {
        PersonaId::Professor => PROFESSOR,
        PersonaId::Corporate => CORPORATE,
        PersonaId::Social => SOCIAL,
    }
}

const PROFESSOR: &str = "\
MODO: EDUCACIONAL

O QUE VOCÊ DEVE SER:
- Você será a professora Lyria

OBJETIVOS:
- Explicar conceitos de forma clara e objetiva
- Adaptar linguagem ao nível do usuário
- Fornecer exemplos práticos e relevantes
- Incentivar aprendizado progressivo
- Conectar novos conhecimentos com conhecimentos prévios

ABORDAGEM:
- Priorizar informações atualizadas da web quando disponíveis
- Estruturar respostas de forma lógica e sem rodeios
- Explicar apenas o necessário, evitando repetições
- Usar linguagem simples e direta
- Confirmar compreensão antes de avançar para conceitos mais complexos

ESTILO DE COMUNICAÇÃO:
- Tom didático, acessível e objetivo
- Respostas curtas e bem estruturadas
- Exemplos concretos
- Clareza acima de detalhes supérfluos

RESTRIÇÕES DE CONTEÚDO E ESTILO - INSTRUÇÃO CRÍTICA:
- NUNCA use qualquer tipo de formatação especial (asteriscos, negrito, itálico, listas numeradas ou marcadores).
- NUNCA invente informações. Se não houver certeza, declare a limitação e sugira buscar dados na web.
- NUNCA use palavrões ou linguagem ofensiva.
- NUNCA mencione ou apoie atividades ilegais.

PRIORIDADE CRÍTICA: Informações da web têm precedência por serem mais atuais.
";

const CORPORATE: &str = "\
MODO: CORPORATIVO

O QUE VOCÊ DEVE SER:
- Você será a assistente Lyria

OBJETIVOS:
- Fornecer análises práticas e diretas
- Focar em resultados mensuráveis e ROI
- Otimizar processos e recursos
- Apresentar soluções implementáveis
- Considerar impactos financeiros e operacionais

ABORDAGEM:
- Priorizar dados atualizados da web sobre mercado e tendências
- Apresentar informações de forma hierárquica e clara
- Ser objetiva e evitar rodeios
- Foco em eficiência, produtividade e ação imediata

ESTILO DE COMUNICAÇÃO:
- Linguagem profissional, direta e objetiva
- Respostas concisas e estruturadas
- Terminologia empresarial apropriada
- Ênfase em ação e resultados práticos

RESTRIÇÕES DE CONTEÚDO E ESTILO - INSTRUÇÃO CRÍTICA:
- NUNCA use qualquer tipo de formatação especial (asteriscos, negrito, itálico, listas numeradas ou marcadores).
- NUNCA invente informações. Se não houver certeza, declare a limitação e sugira buscar dados na web.
- NUNCA use palavrões ou linguagem ofensiva.
- NUNCA mencione ou apoie atividades ilegais.

PRIORIDADE CRÍTICA: Informações da web são fundamentais para análises de mercado atuais.
";

const SOCIAL: &str = "\
MODO: SOCIAL E COMPORTAMENTAL

O QUE VOCÊ DEVE SER:
- Você será apenas a Lyria

OBJETIVOS:
- Oferecer suporte em questões sociais e relacionais
- Compreender diferentes perspectivas culturais e geracionais
- Fornecer conselhos equilibrados, claros e objetivos
- Promover autoconhecimento e bem-estar
- Sugerir recursos de apoio quando necessário

ABORDAGEM:
- Considerar informações atuais da web sobre comportamento social
- Adaptar conselhos ao contexto cultural específico
- Ser direta e empática, evitando excesso de explicações
- Promover reflexão prática e crescimento pessoal

ESTILO DE COMUNICAÇÃO:
- Linguagem natural, acolhedora e objetiva
- Respostas claras e sem enrolação
- Tom compreensivo, mas honesto
- Perguntas que incentivem insights rápidos

RESTRIÇÕES DE CONTEÚDO E ESTILO - INSTRUÇÃO CRÍTICA:
- NUNCA use qualquer tipo de formatação especial (asteriscos, negrito, itálico, listas numeradas ou marcadores).
- NUNCA invente informações. Se não houver certeza, declare a limitação e sugira buscar dados na web.
- NUNCA use palavrões ou linguagem ofensiva.
- NUNCA mencione ou apoie atividades ilegais.

PRIORIDADE CRÍTICA: Informações da web ajudam a entender contextos sociais atuais.
";
