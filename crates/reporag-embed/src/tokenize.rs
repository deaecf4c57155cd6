use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Tokenize a batch, truncating to `max_len` and right-padding every row to the
/// longest sequence in the batch. Returns `(input_ids, attention_mask)`, both `[B, T]`.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = encodings
        .iter()
        .map(|enc| {
            let mut ids = enc.get_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            ids.truncate(max_len);
            mask.truncate(max_len);
            (ids, mask)
        })
        .collect();
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    for (ids, mask) in &mut rows {
        let pad = seq_len - ids.len();
        ids.extend(std::iter::repeat_n(pad_id, pad));
        mask.extend(std::iter::repeat_n(0, pad));
    }

    let batch = rows.len();
    let (ids, mask): (Vec<Vec<u32>>, Vec<Vec<u32>>) = rows.into_iter().unzip();
    let input_ids =
        Tensor::from_iter(ids.into_iter().flatten(), device)?.reshape((batch, seq_len))?;
    let attention_mask =
        Tensor::from_iter(mask.into_iter().flatten(), device)?.reshape((batch, seq_len))?;
    Ok((input_ids, attention_mask))
}
