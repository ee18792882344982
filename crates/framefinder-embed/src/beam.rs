//! Model-agnostic beam search over next-token logits.
//!
//! The caller supplies a step function mapping the live sequences to one
//! logits row per sequence. Scoring follows the usual captioning recipe:
//! repetition penalty on raw logits, log-softmax, EOS masked until the
//! minimum length, finished hypotheses ranked by `sum_logprob / len^alpha`.

use anyhow::{Result, bail};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct BeamConfig {
    pub beam_width: usize,
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
    pub length_penalty: f32,
    pub repetition_penalty: f32,
    pub prompt: Vec<u32>,
    pub eos_token: u32,
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    logprob: f32,
}

#[derive(Debug, Clone)]
struct Finished {
    generated: Vec<u32>,
    score: f32,
}

fn normalized(logprob: f32, len: usize, alpha: f32) -> f32 {
    logprob / (len.max(1) as f32).powf(alpha)
}

/// Divide positive logits and multiply negative ones for every token already present.
pub fn apply_repetition_penalty(logits: &mut [f32], context: &[u32], penalty: f32) {
    if (penalty - 1.0).abs() < f32::EPSILON { return; }
    let seen: HashSet<u32> = context.iter().copied().collect();
    for tok in seen {
        if let Some(l) = logits.get_mut(tok as usize) {
            *l = if *l < 0.0 { *l * penalty } else { *l / penalty };
        }
    }
}

pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|l| (l - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|l| l - log_sum).collect()
}

fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut idx: Vec<(usize, f32)> = values.iter().copied().enumerate().filter(|(_, v)| v.is_finite()).collect();
    idx.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    idx.truncate(k);
    idx
}

/// Run beam search and return the generated tokens of the best hypothesis,
/// without the prompt and without the trailing EOS.
pub fn beam_search<F>(cfg: &BeamConfig, mut step: F) -> Result<Vec<u32>>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
{
    if cfg.beam_width == 0 { bail!("beam width must be at least 1"); }
    let k = cfg.beam_width;
    let prompt_len = cfg.prompt.len();
    let mut beams = vec![Beam { tokens: cfg.prompt.clone(), logprob: 0.0 }];
    let mut finished: Vec<Finished> = Vec::new();

    for generated in 0..cfg.max_new_tokens {
        let seqs: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let rows = step(&seqs)?;
        if rows.len() != beams.len() {
            bail!("step returned {} logit rows for {} beams", rows.len(), beams.len());
        }

        // (parent, token, cumulative logprob)
        let mut candidates: Vec<(usize, u32, f32)> = Vec::with_capacity(2 * k * beams.len());
        for (parent, (beam, mut logits)) in beams.iter().zip(rows).enumerate() {
            apply_repetition_penalty(&mut logits, &beam.tokens, cfg.repetition_penalty);
            let mut lp = log_softmax(&logits);
            if generated < cfg.min_new_tokens {
                if let Some(e) = lp.get_mut(cfg.eos_token as usize) { *e = f32::NEG_INFINITY; }
            }
            for (tok, l) in top_k(&lp, 2 * k) {
                candidates.push((parent, tok as u32, beam.logprob + l));
            }
        }
        candidates.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });

        let mut next = Vec::with_capacity(k);
        for (rank, (parent, tok, logprob)) in candidates.into_iter().enumerate() {
            if tok == cfg.eos_token {
                // Only top-ranked EOS candidates close a hypothesis.
                if rank < k {
                    let generated_tokens = beams[parent].tokens[prompt_len..].to_vec();
                    let len = generated_tokens.len() + 1;
                    finished.push(Finished { generated: generated_tokens, score: normalized(logprob, len, cfg.length_penalty) });
                }
                continue;
            }
            let mut tokens = beams[parent].tokens.clone();
            tokens.push(tok);
            next.push(Beam { tokens, logprob });
            if next.len() == k { break; }
        }
        beams = next;
        if beams.is_empty() { break; }

        if finished.len() >= k {
            finished.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            finished.truncate(k);
            let worst = finished[finished.len() - 1].score;
            let cur_len = beams[0].tokens.len() - prompt_len;
            if normalized(beams[0].logprob, cur_len, cfg.length_penalty) <= worst { break; }
        }
    }

    // Unfinished beams compete when generation ran out of budget.
    for beam in &beams {
        let generated_tokens = beam.tokens[prompt_len..].to_vec();
        let len = generated_tokens.len();
        finished.push(Finished { generated: generated_tokens, score: normalized(beam.logprob, len, cfg.length_penalty) });
    }
    finished
        .into_iter()
        .fold(None::<Finished>, |best, cand| match best {
            Some(b) if b.score >= cand.score => Some(b),
            _ => Some(cand),
        })
        .map(|f| f.generated)
        .ok_or_else(|| anyhow::anyhow!("beam search produced no hypothesis"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EOS: u32 = 1;

    fn cfg(beam_width: usize, min_new: usize, max_new: usize) -> BeamConfig {
        BeamConfig {
            beam_width,
            min_new_tokens: min_new,
            max_new_tokens: max_new,
            length_penalty: 1.0,
            repetition_penalty: 1.0,
            prompt: vec![0],
            eos_token: EOS,
        }
    }

    #[test]
    fn log_softmax_sums_to_one() {
        let lp = log_softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = lp.iter().map(|l| l.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn repetition_penalty_pushes_seen_tokens_down() {
        let mut logits = vec![2.0, -2.0, 2.0];
        apply_repetition_penalty(&mut logits, &[0, 1], 2.0);
        assert_eq!(logits, vec![1.0, -4.0, 2.0]);
    }

    #[test]
    fn stops_at_eos_once_minimum_reached() {
        // Vocab: 0 bos, 1 eos, 2 "a". EOS is always the favourite.
        let out = beam_search(&cfg(3, 2, 10), |seqs| Ok(seqs.iter().map(|_| vec![-9.0, 5.0, 1.0]).collect())).unwrap();
        assert_eq!(out, vec![2, 2]);
    }

    #[test]
    fn beam_finds_sequence_greedy_misses() {
        // Greedy takes token 2 first (0.6) but its continuation is poor;
        // token 3 (0.4) leads to a confident EOS.
        let step = |seqs: &[Vec<u32>]| -> Result<Vec<Vec<f32>>> {
            Ok(seqs
                .iter()
                .map(|s| match s.last().copied() {
                    Some(0) => vec![f32::NEG_INFINITY, f32::NEG_INFINITY, 0.6f32.ln(), 0.4f32.ln()],
                    Some(2) => vec![f32::NEG_INFINITY, 0.3f32.ln(), 0.35f32.ln(), 0.35f32.ln()],
                    _ => vec![f32::NEG_INFINITY, 0.99f32.ln(), 0.005f32.ln(), 0.005f32.ln()],
                })
                .collect())
        };
        let greedy = beam_search(&BeamConfig { length_penalty: 0.0, ..cfg(1, 1, 3) }, step).unwrap();
        let beam = beam_search(&BeamConfig { length_penalty: 0.0, ..cfg(2, 1, 3) }, step).unwrap();
        assert_eq!(beam, vec![3]);
        assert_ne!(greedy, beam);
    }

    #[test]
    fn respects_max_new_tokens() {
        let out = beam_search(&cfg(2, 0, 4), |seqs| Ok(seqs.iter().map(|_| vec![0.0, -50.0, 3.0, 2.0]).collect())).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn repetition_penalty_changes_choice() {
        // Token 2 beats token 3 only while it is unused in the context.
        let mut c = cfg(1, 3, 3);
        c.repetition_penalty = 2.0;
        let out = beam_search(&c, |seqs| Ok(seqs.iter().map(|_| vec![-9.0, -9.0, 2.0, 1.5]).collect())).unwrap();
        assert_eq!(out, vec![2, 3, 2]);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let step = |seqs: &[Vec<u32>]| -> Result<Vec<Vec<f32>>> {
            Ok(seqs.iter().map(|s| vec![0.1, (s.len() as f32) * 0.2, 0.5, 0.5]).collect())
        };
        let a = beam_search(&cfg(4, 1, 6), step).unwrap();
        let b = beam_search(&cfg(4, 1, 6), step).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn step_row_mismatch_is_an_error() {
        let err = beam_search(&cfg(2, 0, 3), |_| Ok(vec![])).unwrap_err();
        assert!(err.to_string().contains("logit rows"));
    }
}
