/// Localized topic-transition markers and positional chapter titles
use crate::language::Language;
use std::collections::HashSet;

/// Discourse markers that typically open a new topic after a sentence ends
pub fn discourse_markers(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &[
            "now", "next", "additionally", "moving on", "so now", "let's talk", "let's move",
            "another", "finally", "first", "second", "third", "lastly", "in conclusion",
            "to summarize", "furthermore", "however", "meanwhile", "okay so", "alright",
        ],
        Language::Spanish => &[
            "ahora", "siguiente", "además", "pasando", "primero", "segundo", "tercero",
            "finalmente", "por último", "en conclusión", "sin embargo", "bueno", "vamos a",
            "otro", "otra",
        ],
        Language::Portuguese => &[
            "agora", "próximo", "além disso", "primeiro", "segundo", "terceiro", "finalmente",
            "por fim", "em conclusão", "no entanto", "então", "vamos", "outro", "outra",
        ],
        Language::French => &[
            "maintenant", "ensuite", "de plus", "premièrement", "deuxièmement", "enfin",
            "finalement", "en conclusion", "cependant", "alors", "passons", "un autre",
            "une autre",
        ],
        Language::German => &[
            "jetzt", "nun", "als nächstes", "außerdem", "zusätzlich", "erstens", "zweitens",
            "schließlich", "zum schluss", "zusammenfassend", "allerdings", "also", "kommen wir",
        ],
        Language::Korean => &[
            "이제", "다음", "다음으로", "또한", "그리고", "첫째", "둘째", "셋째", "마지막으로",
            "결론적으로", "그런데", "자", "그럼",
        ],
        Language::Japanese => &[
            "次に", "さて", "では", "それでは", "また", "さらに", "まず", "最後に",
            "結論として", "ところで", "つまり",
        ],
    }
}

/// Positional titles; chapters beyond the list become "Chapter N"
pub fn chapter_titles(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => &[
            "Opening and Greetings",
            "Topic Introduction",
            "Background and Context",
            "Main Discussion",
            "Key Details",
            "Examples and Applications",
            "Summary and Takeaways",
            "Closing Remarks",
        ],
        Language::Spanish => &[
            "Apertura y saludos",
            "Introducción al tema",
            "Contexto",
            "Discusión principal",
            "Detalles clave",
            "Ejemplos y aplicaciones",
            "Resumen",
            "Cierre",
        ],
        Language::Portuguese => &[
            "Abertura e saudações",
            "Introdução ao tema",
            "Contexto",
            "Discussão principal",
            "Detalhes importantes",
            "Exemplos e aplicações",
            "Resumo",
            "Encerramento",
        ],
        Language::French => &[
            "Ouverture et salutations",
            "Présentation du sujet",
            "Contexte",
            "Discussion principale",
            "Points clés",
            "Exemples et applications",
            "Résumé",
            "Conclusion",
        ],
        Language::German => &[
            "Begrüßung",
            "Einführung ins Thema",
            "Hintergrund",
            "Hauptteil",
            "Wichtige Details",
            "Beispiele und Anwendungen",
            "Zusammenfassung",
            "Abschluss",
        ],
        Language::Korean => &[
            "오프닝 및 인사",
            "주제 소개",
            "배경 설명",
            "주요 내용",
            "핵심 포인트",
            "예시와 활용",
            "요약",
            "마무리",
        ],
        Language::Japanese => &[
            "オープニング",
            "テーマ紹介",
            "背景",
            "本題",
            "重要なポイント",
            "具体例",
            "まとめ",
            "エンディング",
        ],
    }
}

/// Localized "Chapter N"
pub fn fallback_title(language: Language, index: usize) -> String {
    match language {
        Language::English => format!("Chapter {}", index),
        Language::Spanish => format!("Capítulo {}", index),
        Language::Portuguese => format!("Capítulo {}", index),
        Language::French => format!("Chapitre {}", index),
        Language::German => format!("Kapitel {}", index),
        Language::Korean => format!("챕터 {}", index),
        Language::Japanese => format!("チャプター {}", index),
    }
}

/// Title for the 1-based chapter `index`
pub fn title_for(language: Language, index: usize) -> String {
    chapter_titles(language)
        .get(index.wrapping_sub(1))
        .map(|t| t.to_string())
        .unwrap_or_else(|| fallback_title(language, index))
}

/// Lookup set of normalized marker phrases for one language
#[derive(Debug, Clone)]
pub struct MarkerSet {
    language: Language,
    phrases: HashSet<String>,
    longest: usize,
}

impl MarkerSet {
    pub fn for_language(language: Language) -> Self {
        Self::with_extra(language, &[])
    }

    /// Built-in markers plus user-supplied phrases
    pub fn with_extra(language: Language, extra: &[String]) -> Self {
        let phrases: HashSet<String> = discourse_markers(language)
            .iter()
            .map(|m| m.to_string())
            .chain(extra.iter().map(|m| normalize_phrase(m)))
            .filter(|m| !m.is_empty())
            .collect();
        let longest = phrases
            .iter()
            .map(|p| p.split_whitespace().count())
            .max()
            .unwrap_or(1);

        Self {
            language,
            phrases,
            longest,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Word count of the longest phrase
    pub fn longest_phrase(&self) -> usize {
        self.longest
    }

    /// Whether the leading tokens form a marker.
    ///
    /// Tokens are joined progressively (1, 2, 3 …) so multi-word markers match.
    /// Unspaced scripts also match a marker at the start of the first token.
    pub fn matches(&self, tokens: &[String]) -> bool {
        let mut phrase = String::new();
        for token in tokens {
            if token.is_empty() {
                break;
            }
            if !phrase.is_empty() {
                phrase.push(' ');
            }
            phrase.push_str(token);
            if self.phrases.contains(&phrase) {
                return true;
            }
        }

        if self.language.is_unspaced() {
            if let Some(first) = tokens.first() {
                return self.phrases.iter().any(|m| first.starts_with(m.as_str()));
            }
        }

        false
    }
}

/// Lowercase and strip surrounding punctuation, keeping inner apostrophes as ASCII `'`
pub fn normalize_token(token: &str) -> String {
    token
        .replace(['\u{2018}', '\u{2019}'], "'")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .trim_matches('\'')
        .to_lowercase()
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}
