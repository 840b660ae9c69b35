//! Fixtures compartilhadas pelos testes.

use once_cell::sync::Lazy;

use crate::config::TrainerConfig;
use crate::corpus::{read_examples, TrainingExample};
use crate::parser::AddressParser;
use crate::trainer::AddressParserTrainer;

/// Corpus pequeno e sem ruído (EUA + dois endereços alemães).
pub const SAMPLE_CORPUS: &str = "\
en\tus\t123/house_number Fake/road Street/road Brooklyn/city NY/state 12345/postcode
en\tus\t456/house_number Elm/road Street/road Brooklyn/city NY/state 11201/postcode
en\tus\t78/house_number Oak/road Avenue/road Queens/city NY/state 11375/postcode
en\tus\t9/house_number Pine/road Road/road Albany/city NY/state 12207/postcode
en\tus\t2100/house_number Cedar/road Lane/road Boston/city MA/state 02118/postcode
en\tus\t34/house_number Birch/road Street/road Boston/city MA/state 02116/postcode
en\tus\t501/house_number Walnut/road Avenue/road Chicago/city IL/state 60614/postcode
en\tus\t77/house_number Lake/road Shore/road Drive/road Chicago/city IL/state 60611/postcode
en\tus\t15/house_number Spruce/road Lane/road Queens/city NY/state 11354/postcode
en\tus\t880/house_number Hill/road Road/road Albany/city NY/state 12203/postcode
en\tus\t230/house_number River/road Street/road Chicago/city IL/state 60607/postcode
en\tus\t61/house_number Park/road Avenue/road Brooklyn/city NY/state 11205/postcode
en\tus\t402/house_number Vine/road Street/road Albany/city NY/state 12210/postcode
en\tus\t5/house_number Aspen/road Road/road Boston/city MA/state 02120/postcode
en\tus\t19/house_number Bay/road Lane/road Chicago/city IL/state 60616/postcode
en\tus\t12/house_number Cherry/road Street/road ,/fsep Brooklyn/city ,/fsep NY/state
en\tus\t640/house_number Willow/road Avenue/road ,/fsep Chicago/city ,/fsep IL/state
en\tus\t3/house_number Ash/road Road/road ,/fsep Boston/city ,/fsep MA/state
en\tus\t41/house_number Poplar/road Lane/road ,/fsep Queens/city ,/fsep NY/state 11368/postcode
en\tus\t310/house_number Grove/road Street/road ,/fsep Albany/city ,/fsep NY/state 12206/postcode
en\tus\t88/house_number Union/road Avenue/road ,/fsep Brooklyn/city ,/fsep NY/state 11211/postcode
en\tus\t7/house_number Mill/road Road/road ,/fsep Chicago/city ,/fsep IL/state 60622/postcode
de\tde\tHauptstraße/road 5/house_number 10115/postcode Berlin/city
de\tde\tGartenstraße/road 12/house_number 10117/postcode Berlin/city
";

/// Configuração de treino rápida e determinística. Palavras e frases vistas
/// uma única vez ficam fora dos dicionários, o que exercita o caminho de
/// palavras desconhecidas já no treino.
pub fn test_config() -> TrainerConfig {
    TrainerConfig {
        iterations: 10,
        min_vocab_count: 2,
        min_phrase_count: 2,
        shuffle: true,
        seed: 7,
    }
}

pub fn sample_examples() -> Vec<TrainingExample> {
    let (examples, skipped) = read_examples(SAMPLE_CORPUS.as_bytes()).unwrap();
    assert_eq!(skipped, 0);
    examples
}

static PARSER: Lazy<AddressParser> = Lazy::new(|| {
    let (parser, _) = AddressParserTrainer::new(test_config())
        .train(&sample_examples())
        .unwrap();
    parser
});

/// Parser treinado sobre [`SAMPLE_CORPUS`], compartilhado entre os testes.
pub fn trained_parser() -> &'static AddressParser {
    &PARSER
}
