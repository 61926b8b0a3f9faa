//! Offline responder: the dispatcher's terminal state.
//!
//! When every backend has failed (or the request deadline ran out) the answer
//! comes from a fixed table keyed by the query's leading interrogative word.
//! No I/O, no randomness: the same query always yields the same reply, and the
//! reply is never empty.

/// Reply used when the query doesn't start with a known interrogative.
pub const GENERIC_REPLY: &str = "Estou com uma dificuldade técnica no momento e não consegui \
gerar uma resposta. Por favor, tente novamente em alguns instantes.";

/// Two-word interrogatives are checked before single words.
const TWO_WORD_TEMPLATES: &[(&str, &str)] = &[
    (
        "o que",
        "No momento não consigo consultar meus serviços para explicar o que é isso. \
         Tente novamente em instantes; enquanto isso, uma fonte de referência confiável pode ajudar.",
    ),
    (
        "por que",
        "No momento não consigo analisar os motivos por trás dessa questão. \
         Tente novamente em instantes para uma explicação completa.",
    ),
    (
        "por quê",
        "No momento não consigo analisar os motivos por trás dessa questão. \
         Tente novamente em instantes para uma explicação completa.",
    ),
    (
        "para que",
        "No momento não consigo explicar para que isso serve. \
         Tente novamente em instantes.",
    ),
];

const ONE_WORD_TEMPLATES: &[(&[&str], &str)] = &[
    (
        &["como"],
        "No momento não consigo acessar meus serviços para explicar como isso funciona. \
         Tente novamente em instantes; um guia passo a passo também pode ajudar.",
    ),
    (
        &["qual", "quais", "que"],
        "No momento não consigo verificar essa informação. \
         Tente novamente em instantes para uma resposta precisa.",
    ),
    (
        &["porque", "porquê"],
        "No momento não consigo analisar os motivos por trás dessa questão. \
         Tente novamente em instantes para uma explicação completa.",
    ),
    (
        &["quando"],
        "No momento não consigo confirmar datas ou prazos. \
         Tente novamente em instantes ou consulte uma fonte oficial atualizada.",
    ),
    (
        &["onde"],
        "No momento não consigo confirmar localizações. \
         Tente novamente em instantes ou consulte um serviço de mapas.",
    ),
    (
        &["quem"],
        "No momento não consigo confirmar informações sobre pessoas ou organizações. \
         Tente novamente em instantes.",
    ),
    (
        &["quanto", "quanta", "quantos", "quantas"],
        "No momento não consigo calcular ou verificar valores. \
         Tente novamente em instantes para números atualizados.",
    ),
];

/// Deterministic keyword → template lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResponder;

impl OfflineResponder {
    pub fn new() -> Self {
        Self
    }

    /// Pick a canned reply for `query`.
    pub fn respond(&self, query: &str) -> &'static str {
        let words = leading_words(query);

        if let [first, second, ..] = words.as_slice() {
            let pair = format!("{first} {second}");
            if let Some((_, reply)) = TWO_WORD_TEMPLATES.iter().find(|(k, _)| *k == pair) {
                return *reply;
            }
        }

        if let Some(first) = words.first() {
            if let Some((_, reply)) = ONE_WORD_TEMPLATES
                .iter()
                .find(|(keys, _)| keys.contains(&first.as_str()))
            {
                return *reply;
            }
        }

        GENERIC_REPLY
    }
}

/// First two words, lowercased, with surrounding punctuation removed.
fn leading_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .take(2)
        .collect()
}
