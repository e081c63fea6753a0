//! 文本分块器
//!
//! 把章节文本切成适合单次 TTS 请求的分块：
//! 1. 先按句末标点和换行切句
//! 2. 超长句子退化为按空白切词，绝不切断单词
//! 3. 贪心合并相邻片段，直到接近 `max_chars`
//!
//! 每个分块都是原文的连续切片（只去掉首尾空白），分块之间只隔着空白。

use std::ops::Range;
use thiserror::Error;

use crate::domain::book::Chunk;
use crate::domain::voice::{LanguageCode, VoiceId};

/// 默认单块最大字符数
pub const DEFAULT_MAX_CHARS: usize = 400;

/// 分块错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Chunk limit must be greater than zero")]
    ZeroLimit,
}

/// 强分隔符（句末标点）
#[inline]
fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '?' | '!' | '…' | '。' | '？' | '！')
}

/// 全角句末标点后不需要空白即可断句
#[inline]
fn is_fullwidth_end(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！')
}

/// 句末标点后可能紧跟的收尾符号（引号、括号）
#[inline]
fn is_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '」' | '』' | '）'
    )
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

/// 去掉区间首尾空白，全是空白则返回 None
fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let start = span.start + (slice.len() - slice.trim_start().len());
    let end = span.end - (slice.len() - slice.trim_end().len());
    (start < end).then_some(start..end)
}

/// 按句末标点和换行切句，返回去除首尾空白后的句子区间
fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        let boundary = if ch == '\n' {
            Some(pos)
        } else if is_sentence_end(ch) {
            let mut end = pos + ch.len_utf8();
            while let Some(&(next_pos, next)) = chars.peek() {
                if is_sentence_end(next) || is_closer(next) {
                    end = next_pos + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            match chars.peek() {
                None => Some(end),
                Some(&(_, next)) if next.is_whitespace() || is_fullwidth_end(ch) => Some(end),
                _ => None,
            }
        } else {
            None
        };

        if let Some(end) = boundary {
            if let Some(span) = trim_span(text, start..end) {
                spans.push(span);
            }
            start = end;
        }
    }

    if let Some(span) = trim_span(text, start..text.len()) {
        spans.push(span);
    }

    spans
}

/// 区间内按空白切出的单词区间
fn word_spans(text: &str, span: Range<usize>) -> Vec<Range<usize>> {
    let mut words = Vec::new();
    let mut word_start: Option<usize> = None;

    for (offset, ch) in text[span.clone()].char_indices() {
        let pos = span.start + offset;
        match (ch.is_whitespace(), word_start) {
            (true, Some(start)) => {
                words.push(start..pos);
                word_start = None;
            }
            (false, None) => word_start = Some(pos),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        words.push(start..span.end);
    }

    words
}

/// 贪心合并相邻区间，合并后的区间字符数不超过 `max_chars`
///
/// 单个超长区间原样保留（唯一允许超限的情况）
fn pack(text: &str, units: Vec<Range<usize>>, max_chars: usize) -> Vec<Range<usize>> {
    let mut packed: Vec<Range<usize>> = Vec::new();
    let mut current: Option<Range<usize>> = None;

    for unit in units {
        current = match current {
            None => Some(unit),
            Some(cur) => {
                let merged = cur.start..unit.end;
                if char_len(text, &merged) <= max_chars {
                    Some(merged)
                } else {
                    packed.push(cur);
                    Some(unit)
                }
            }
        };
    }
    if let Some(cur) = current {
        packed.push(cur);
    }

    packed
}

/// 计算分块区间（不附带音色信息）
pub fn chunk_spans(text: &str, max_chars: usize) -> Result<Vec<Range<usize>>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::ZeroLimit);
    }

    let mut units = Vec::new();
    for sentence in sentence_spans(text) {
        if char_len(text, &sentence) <= max_chars {
            units.push(sentence);
        } else {
            // 超长句子：按单词切，再在句内合并
            let words = word_spans(text, sentence);
            units.extend(pack(text, words, max_chars));
        }
    }

    Ok(pack(text, units, max_chars))
}

/// 把章节文本切成分块
///
/// 空文本或纯空白文本返回空列表。结果只取决于输入，重复调用得到相同序列。
pub fn split(
    text: &str,
    max_chars: usize,
    voice: &VoiceId,
    language: &LanguageCode,
) -> Result<Vec<Chunk>, ChunkingError> {
    let chunks = chunk_spans(text, max_chars)?
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk {
            index,
            text: text[span.clone()].to_string(),
            span,
            voice: voice.clone(),
            language: language.clone(),
        })
        .collect();

    Ok(chunks)
}
