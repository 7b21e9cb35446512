//! Pattern groups for the request classifier.
//!
//! Every entry is a regex fragment; a group is compiled into one
//! case-insensitive alternation.  Cyrillic stems take any inflection via
//! `[а-яё]*`, and `\b` is Unicode-aware, so both scripts anchor on whole
//! words.

/// Target languages and their proficiency exams.
pub const LANGUAGE_PATTERNS: &[&str] = &[
    // ── English ────────────────────────────────────────────────────────
    r"\bангл\b", // chat shorthand
    r"\bанглийск[а-яё]*\b",
    r"\benglish\b",
    r"\bielts\b",
    r"\btoefl\b",
    // ── Spanish ────────────────────────────────────────────────────────
    r"\bиспанск[а-яё]*\b",
    r"\bspanish\b",
    r"\bdele\b",
    // ── Italian ────────────────────────────────────────────────────────
    r"\bитальянск[а-яё]*\b",
    r"\bitalian\b",
    r"\bceli\b",
    r"\bcils\b",
    // ── Chinese ────────────────────────────────────────────────────────
    r"\bкитайск[а-яё]*\b",
    r"\bchinese\b",
    r"\bmandarin\b",
    r"\bhsk\b",
];

/// "Tutor / teacher" role nouns.
pub const ROLE_PATTERNS: &[&str] = &[
    r"\bрепетитор[а-яё]*\b",
    r"\bпреподавател[а-яё]*\b",
    r"\bпреподав\b",
    r"\bучител[а-яё]*\b",
    r"\bнаставник[а-яё]*\b",
    r"\btutors?\b",
    r"\btutoring\b",
    r"\bteachers?\b",
    r"\bcoach(es)?\b",
];

/// Schools, courses, lessons, exam prep.
pub const SCHOOL_PATTERNS: &[&str] = &[
    r"\bонлайн[- ]?школ[а-яё]*\b",
    r"\bшкол[а-яё]*\b",
    r"\bкурс[а-яё]*\b",
    r"\bзаняти[а-яё]*\b",
    r"\bурок[а-яё]*\b",
    r"\bподготовк[а-яё]*\b",
    r"\bschools?\b",
    r"\bcourses?\b",
    r"\blessons?\b",
    r"\bclasses\b",
    r"\bexam prep(aration)?\b",
];

/// Request / recommendation-seeking phrases.
pub const INTENT_PATTERNS: &[&str] = &[
    // RU
    r"\bищу\b",
    r"\bищем\b",
    r"\bнуж(ен|на|но|ны)\b",
    r"\bпорекомендуйте\b",
    r"\bпосоветуйте\b",
    r"\bподскажите\b",
    r"\bможете ли порекомендовать\b",
    r"\bкто (может|сможет) (посоветовать|порекомендовать|подсказать)\b",
    r"\bгде найти\b",
    // EN
    r"\blooking for\b",
    r"\bneeds?\b",
    r"\brecommend(ation|ations|ed)?\b",
    r"\bany (suggestions|recommendations|advice)\b",
    r"\bwho can (suggest|recommend)\b",
    r"\bcan anyone (suggest|recommend)\b",
];

/// Last-resort request words, matched anywhere in the text alongside a
/// literal question mark.
pub const FALLBACK_PATTERNS: &[&str] = &[
    r"подскажите",
    r"посоветуйте",
    r"ищу",
    r"нужен",
    r"где найти",
];
