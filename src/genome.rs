//! Genetic encoding: genes, genomes, reproduction, and similarity metrics.
//!
//! A gene is one encoded synaptic connection. A genome is an ordered gene
//! sequence; [`crate::brain::compile_network`] turns it into an executable
//! network at birth. Reproduction recombines and mutates parent genomes at
//! the generation boundary.

use crate::config::Config;
use crate::peeps::Peeps;
use crate::rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source/sink type tag: an internal neuron.
pub const NEURON: u8 = 0;
/// Source type tag: a sensor input.
pub const SENSOR: u8 = 1;
/// Sink type tag: an action output.
pub const ACTION: u8 = 1;

/// One encoded synaptic connection.
///
/// Source and sink numbers carry 7 bits of entropy; they are reduced modulo
/// the sensor/action/neuron cardinality when the network is compiled. The
/// integer weight maps to a float as `weight / 8192.0`, roughly +-4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub source_type: u8,
    pub source_num: u8,
    pub sink_type: u8,
    pub sink_num: u8,
    pub weight: i16,
}

impl Gene {
    /// Effective floating-point connection weight.
    #[inline]
    pub fn weight_as_float(&self) -> f32 {
        self.weight as f32 / 8192.0
    }

    /// Uniform random weight over the full `i16` range.
    pub fn make_random_weight() -> i16 {
        (rng::random_range(0, 0xffff) as i32 - 0x8000) as i16
    }

    /// Fully random gene.
    pub fn random() -> Gene {
        Gene {
            source_type: (rng::random_u32() & 1) as u8,
            source_num: rng::random_range(0, 0x7f) as u8,
            sink_type: (rng::random_u32() & 1) as u8,
            sink_num: rng::random_range(0, 0x7f) as u8,
            weight: Gene::make_random_weight(),
        }
    }

    /// Packed little-endian wire form: bit 0 source type, bits 1..=7 source
    /// number, bit 8 sink type, bits 9..=15 sink number, top 16 bits weight.
    pub fn as_u32(&self) -> u32 {
        (self.source_type as u32 & 1)
            | ((self.source_num as u32 & 0x7f) << 1)
            | ((self.sink_type as u32 & 1) << 8)
            | ((self.sink_num as u32 & 0x7f) << 9)
            | ((self.weight as u16 as u32) << 16)
    }

    /// Inverse of [`Gene::as_u32`].
    pub fn from_u32(raw: u32) -> Gene {
        Gene {
            source_type: (raw & 1) as u8,
            source_num: ((raw >> 1) & 0x7f) as u8,
            sink_type: ((raw >> 8) & 1) as u8,
            sink_num: ((raw >> 9) & 0x7f) as u8,
            weight: (raw >> 16) as u16 as i16,
        }
    }
}

/// Ordered sequence of genes; one agent's heritable code.
pub type Genome = Vec<Gene>;

/// Random genome with length drawn from the configured initial range.
pub fn make_random_genome(config: &Config) -> Genome {
    let length = rng::random_range(
        config.genome.initial_length_min,
        config.genome.initial_length_max,
    );
    (0..length).map(|_| Gene::random()).collect()
}

/// Structured single-bit mutation of one random gene: with equal probability
/// flip the source type, the sink type, one source-number bit, one
/// sink-number bit, or one weight bit (positions 1..=15, skipping the lowest
/// so a flip is never negligible).
fn random_bit_flip(genome: &mut Genome) {
    let index = rng::random_range(0, genome.len() as u32 - 1) as usize;
    let gene = &mut genome[index];
    let chance = rng::random_unit();
    if chance < 0.2 {
        gene.source_type ^= 1;
    } else if chance < 0.4 {
        gene.sink_type ^= 1;
    } else if chance < 0.6 {
        gene.source_num ^= 1u8 << rng::random_range(0, 6);
    } else if chance < 0.8 {
        gene.sink_num ^= 1u8 << rng::random_range(0, 6);
    } else {
        gene.weight ^= 1i16 << rng::random_range(1, 15);
    }
}

/// Trim a genome down to `length` genes, dropping from the front or the back
/// with equal probability. At least one gene always survives.
fn crop_length(genome: &mut Genome, length: usize) {
    if genome.len() > length && length > 0 {
        let excess = genome.len() - length;
        if rng::random_unit() < 0.5 {
            genome.drain(..excess);
        } else {
            genome.truncate(length);
        }
    }
}

/// With probability `gene_insertion_deletion_rate`, delete one random gene
/// (when more than one remains) or append a fresh random gene (when under the
/// configured maximum). `deletion_ratio` splits the two outcomes.
fn random_insert_deletion(genome: &mut Genome, config: &Config) {
    if (rng::random_unit() as f64) < config.mutation.gene_insertion_deletion_rate {
        if (rng::random_unit() as f64) < config.mutation.deletion_ratio {
            if genome.len() > 1 {
                let index = rng::random_range(0, genome.len() as u32 - 1) as usize;
                genome.remove(index);
            }
        } else if genome.len() < config.genome.max_length as usize {
            genome.push(Gene::random());
        }
    }
}

/// Visit each gene independently and mutate it with probability
/// `point_mutation_rate`.
fn apply_point_mutations(genome: &mut Genome, config: &Config) {
    for _ in 0..genome.len() {
        if (rng::random_unit() as f64) < config.mutation.point_mutation_rate {
            random_bit_flip(genome);
        }
    }
}

/// Produce one child genome from the parent pool.
///
/// Parent pools arrive sorted by survival score, best first. With
/// fitness-weighted selection the first pick lands anywhere past the top
/// slot and the second pick strictly above it, biasing pairings toward
/// high-scoring parents. Sexual reproduction overlays a random contiguous
/// slice of the shorter parent onto the longer one, then crops to the
/// average parent length (probabilistically rounding odd sums). The result
/// then passes through the insertion/deletion and point mutation stages.
pub fn generate_child_genome(parent_genomes: &[Arc<Genome>], config: &Config) -> Genome {
    let (parent1, parent2) =
        if config.reproduction.choose_parents_by_fitness && parent_genomes.len() > 1 {
            let p1 = rng::random_range(1, parent_genomes.len() as u32 - 1);
            let p2 = rng::random_range(0, p1 - 1);
            (p1 as usize, p2 as usize)
        } else {
            let last = parent_genomes.len() as u32 - 1;
            (
                rng::random_range(0, last) as usize,
                rng::random_range(0, last) as usize,
            )
        };

    let g1 = &*parent_genomes[parent1];
    let g2 = &*parent_genomes[parent2];
    debug_assert!(!g1.is_empty() && !g2.is_empty());

    let mut genome: Genome;
    if config.reproduction.sexual_reproduction {
        let (longer, shorter) = if g1.len() > g2.len() { (g1, g2) } else { (g2, g1) };
        genome = longer.clone();

        // Overlay a random contiguous slice of the shorter parent, same offset.
        let mut index0 = rng::random_range(0, shorter.len() as u32 - 1) as usize;
        let mut index1 = rng::random_range(0, shorter.len() as u32) as usize;
        if index0 > index1 {
            std::mem::swap(&mut index0, &mut index1);
        }
        genome[index0..index1].copy_from_slice(&shorter[index0..index1]);

        // Crop to the average parent length, rounding odd sums up half the time.
        let mut sum = g1.len() + g2.len();
        if sum & 1 == 1 && rng::random_u32() & 1 == 1 {
            sum += 1;
        }
        crop_length(&mut genome, sum / 2);
    } else {
        genome = g2.clone();
    }

    random_insert_deletion(&mut genome, config);
    debug_assert!(!genome.is_empty());
    apply_point_mutations(&mut genome, config);
    debug_assert!(!genome.is_empty());
    debug_assert!(genome.len() <= config.genome.max_length as usize);

    genome
}

/// Two genes are equal only when all five fields match.
#[inline]
fn genes_match(g1: &Gene, g2: &Gene) -> bool {
    g1 == g2
}

/// Jaro-Winkler style similarity, tolerant of gaps, relocations, and length
/// differences. Only the first 20 genes of each genome are compared, which
/// keeps long-genome comparisons tractable.
pub fn jaro_winkler_similarity(genome1: &Genome, genome2: &Genome) -> f32 {
    const MAX_GENES_TO_COMPARE: usize = 20;

    let s = genome1;
    let a = genome2;
    let sl = s.len().min(MAX_GENES_TO_COMPARE);
    let al = a.len().min(MAX_GENES_TO_COMPARE);
    if sl == 0 || al == 0 {
        return 0.0;
    }

    let mut sflags = vec![false; sl];
    let mut aflags = vec![false; al];
    let range = (sl.max(al) / 2).saturating_sub(1);

    // matching genes within the search range
    let mut matches = 0usize;
    for i in 0..al {
        let lo = i.saturating_sub(range);
        let hi = (i + range + 1).min(sl);
        for j in lo..hi {
            if genes_match(&a[i], &s[j]) && !sflags[j] {
                sflags[j] = true;
                aflags[i] = true;
                matches += 1;
                break;
            }
        }
    }
    if matches == 0 {
        return 0.0;
    }

    // transpositions: matched genes that pair up out of order
    let mut transpositions = 0usize;
    let mut l = 0usize;
    for i in 0..al {
        if aflags[i] {
            let mut j = l;
            while j < sl {
                if sflags[j] {
                    l = j + 1;
                    break;
                }
                j += 1;
            }
            if j < sl && !genes_match(&a[i], &s[j]) {
                transpositions += 1;
            }
        }
    }
    let transpositions = transpositions / 2;

    let m = matches as f32;
    ((m / sl as f32) + (m / al as f32) + ((matches - transpositions) as f32 / m)) / 3.0
}

/// Bitwise Hamming similarity over the packed 32-bit gene encoding, rescaled
/// so two uncorrelated random genomes score near 0 and identical genomes
/// score 1. Genomes must have equal length.
pub fn hamming_similarity_bits(genome1: &Genome, genome2: &Genome) -> f32 {
    debug_assert_eq!(genome1.len(), genome2.len());
    let pairs = genome1.len().min(genome2.len());
    if pairs == 0 {
        return 0.0;
    }
    let differing: u32 = genome1
        .iter()
        .zip(genome2.iter())
        .map(|(g1, g2)| (g1.as_u32() ^ g2.as_u32()).count_ones())
        .sum();
    let length_bits = (pairs * 32) as f32;
    1.0 - (2.0 * differing as f32 / length_bits).min(1.0)
}

/// Gene-atomic Hamming similarity: counts genes whose packed words match,
/// normalized over the byte length of the genome. Genomes must have equal
/// length.
pub fn hamming_similarity_bytes(genome1: &Genome, genome2: &Genome) -> f32 {
    debug_assert_eq!(genome1.len(), genome2.len());
    let pairs = genome1.len().min(genome2.len());
    if pairs == 0 {
        return 0.0;
    }
    let matching = genome1
        .iter()
        .zip(genome2.iter())
        .filter(|(g1, g2)| g1.as_u32() == g2.as_u32())
        .count();
    matching as f32 / (pairs * 4) as f32
}

/// Similarity in `[0, 1]` using the configured comparison method:
/// 0 Jaro-Winkler, 1 bitwise Hamming, 2 gene-atomic Hamming.
pub fn genome_similarity(method: u32, genome1: &Genome, genome2: &Genome) -> f32 {
    match method {
        0 => jaro_winkler_similarity(genome1, genome2),
        1 => hamming_similarity_bits(genome1, genome2),
        2 => hamming_similarity_bytes(genome1, genome2),
        _ => unreachable!("unknown genome comparison method {method}"),
    }
}

/// Population-wide diversity estimate: one minus the mean similarity over up
/// to 1000 sampled adjacent index pairs.
pub fn genetic_diversity(peeps: &Peeps, method: u32) -> f32 {
    let population = peeps.population();
    if population < 2 {
        return 0.0;
    }

    let samples = population.min(1000);
    let mut similarity_sum = 0.0f32;
    for _ in 0..samples {
        let index0 = rng::random_range(1, population - 1) as u16;
        let index1 = index0 + 1;
        similarity_sum += genome_similarity(
            method,
            &peeps[index0].genome,
            &peeps[index1].genome,
        );
    }
    1.0 - similarity_sum / samples as f32
}

/// Deterministic display color byte for a genome, assembled from length
/// parity and the head/tail genes' type and low index bits. Agents with
/// similar genomes tend toward similar colors.
pub fn genetic_color(genome: &Genome) -> u8 {
    if genome.is_empty() {
        return 0;
    }
    let front = &genome[0];
    let back = &genome[genome.len() - 1];
    (genome.len() as u8 & 1)
        | ((front.source_type & 1) << 1)
        | ((back.source_type & 1) << 2)
        | ((front.sink_type & 1) << 3)
        | ((back.sink_type & 1) << 4)
        | ((front.source_num & 1) << 5)
        | ((front.sink_num & 1) << 6)
        | ((back.source_num & 1) << 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.genome.initial_length_min = 8;
        config.genome.initial_length_max = 16;
        config.genome.max_length = 32;
        config
    }

    fn fixed_gene(tag: u8) -> Gene {
        Gene {
            source_type: SENSOR,
            source_num: tag,
            sink_type: NEURON,
            sink_num: tag,
            weight: tag as i16 * 100,
        }
    }

    #[test]
    fn test_gene_wire_roundtrip() {
        crate::rng::seed_thread(true, 11, 0);
        for _ in 0..100 {
            let gene = Gene::random();
            assert_eq!(Gene::from_u32(gene.as_u32()), gene);
        }
        // negative weights survive the packing
        let gene = Gene {
            source_type: NEURON,
            source_num: 127,
            sink_type: ACTION,
            sink_num: 0,
            weight: -8192,
        };
        assert_eq!(Gene::from_u32(gene.as_u32()), gene);
    }

    #[test]
    fn test_random_genome_length_bounds() {
        crate::rng::seed_thread(true, 5, 0);
        let config = test_config();
        for _ in 0..50 {
            let genome = make_random_genome(&config);
            assert!((8..=16).contains(&genome.len()));
        }
    }

    #[test]
    fn test_asexual_no_mutation_clones_parent() {
        crate::rng::seed_thread(true, 3, 0);
        let mut config = test_config();
        config.reproduction.sexual_reproduction = false;
        config.mutation.point_mutation_rate = 0.0;
        config.mutation.gene_insertion_deletion_rate = 0.0;

        let parent = Arc::new(make_random_genome(&config));
        let pool = vec![parent.clone()];
        for _ in 0..10 {
            let child = generate_child_genome(&pool, &config);
            assert_eq!(&child, &*parent);
        }
    }

    #[test]
    fn test_sexual_child_length_is_parent_average() {
        crate::rng::seed_thread(true, 17, 0);
        let mut config = test_config();
        config.mutation.point_mutation_rate = 0.0;
        config.mutation.gene_insertion_deletion_rate = 0.0;
        config.reproduction.choose_parents_by_fitness = false;

        let short: Genome = (0..10).map(|i| fixed_gene(i)).collect();
        let long: Genome = (0..20).map(|i| fixed_gene(i + 50)).collect();
        let pool = vec![Arc::new(short), Arc::new(long)];
        for _ in 0..50 {
            let child = generate_child_genome(&pool, &config);
            // average of 10 and 20, or either parent alone
            assert!(child.len() == 15 || child.len() == 10 || child.len() == 20);
            assert!(!child.is_empty());
        }
    }

    #[test]
    fn test_child_never_exceeds_max_length() {
        crate::rng::seed_thread(true, 23, 0);
        let mut config = test_config();
        config.genome.max_length = 12;
        config.mutation.gene_insertion_deletion_rate = 1.0;
        config.mutation.deletion_ratio = 0.0; // always try to insert

        let parent: Genome = (0..12).map(fixed_gene).collect();
        let pool = vec![Arc::new(parent)];
        for _ in 0..50 {
            let child = generate_child_genome(&pool, &config);
            assert!(child.len() <= 12);
        }
    }

    #[test]
    fn test_deletion_preserves_one_gene() {
        crate::rng::seed_thread(true, 29, 0);
        let mut config = test_config();
        config.reproduction.sexual_reproduction = false;
        config.mutation.gene_insertion_deletion_rate = 1.0;
        config.mutation.deletion_ratio = 1.0; // always delete

        let pool = vec![Arc::new(vec![fixed_gene(1)])];
        for _ in 0..20 {
            let child = generate_child_genome(&pool, &config);
            assert_eq!(child.len(), 1);
        }
    }

    #[test]
    fn test_point_mutation_changes_genes() {
        crate::rng::seed_thread(true, 31, 0);
        let mut config = test_config();
        config.reproduction.sexual_reproduction = false;
        config.mutation.point_mutation_rate = 1.0;
        config.mutation.gene_insertion_deletion_rate = 0.0;

        let parent: Genome = (0..16).map(fixed_gene).collect();
        let pool = vec![Arc::new(parent.clone())];
        let child = generate_child_genome(&pool, &config);
        assert_eq!(child.len(), parent.len());
        assert_ne!(child, parent);
    }

    #[test]
    fn test_jaro_winkler_identical_and_disjoint() {
        let a: Genome = (0..10).map(fixed_gene).collect();
        let b: Genome = (0..10).map(|i| fixed_gene(i + 100)).collect();
        assert!((jaro_winkler_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(jaro_winkler_similarity(&a, &b), 0.0);
        assert_eq!(jaro_winkler_similarity(&a, &Vec::new()), 0.0);
    }

    #[test]
    fn test_jaro_winkler_partial_overlap() {
        let a: Genome = (0..10).map(fixed_gene).collect();
        let mut b = a.clone();
        b[3] = fixed_gene(99);
        let sim = jaro_winkler_similarity(&a, &b);
        assert!(sim > 0.8 && sim < 1.0, "got {sim}");
    }

    #[test]
    fn test_hamming_bits_extremes() {
        let a: Genome = (0..8).map(fixed_gene).collect();
        assert!((hamming_similarity_bits(&a, &a) - 1.0).abs() < 1e-6);

        // complement of every word differs in all 32 bits
        let b: Genome = a.iter().map(|g| Gene::from_u32(!g.as_u32())).collect();
        assert_eq!(hamming_similarity_bits(&a, &b), 0.0);
    }

    #[test]
    fn test_hamming_bytes_counts_matching_words() {
        let a: Genome = (0..8).map(fixed_gene).collect();
        let mut b = a.clone();
        b[0] = fixed_gene(200);
        // 7 of 8 words match, normalized over byte length
        let expected = 7.0 / 32.0;
        assert!((hamming_similarity_bytes(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_genetic_color_is_deterministic() {
        let genome: Genome = (0..9).map(fixed_gene).collect();
        assert_eq!(genetic_color(&genome), genetic_color(&genome.clone()));
        assert_eq!(genetic_color(&Vec::new()), 0);
    }
}
