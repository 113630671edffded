//! Integration tests for the customization map codec

use proptest::prelude::*;

use swgkit_parsers::customization::{self, CustomizationMap, CustomizationVariable, IntRange, ValueRange};

fn variable(name: &str, max: i32) -> CustomizationVariable {
    CustomizationVariable {
        variable: name.to_string(),
        range: ValueRange::Int(IntRange {
            min: 0,
            max_exclusive: max,
        }),
        default: 0,
    }
}

#[test]
fn test_assets_share_customization_after_reload() {
    let mut map = CustomizationMap::new();
    let male = map.add_asset("object/creature/player/shared_human_male.iff").unwrap();
    let female = map.add_asset("object/creature/player/shared_human_female.iff").unwrap();
    map.add_customization(male, &[variable("/shared_owner/blend_fat", 256)])
        .unwrap();
    map.add_links(male, &[female]).unwrap();
    assert!(map.clone_customization(male, female).unwrap());

    let reloaded = customization::decode(&customization::encode(&map)).unwrap();
    assert_eq!(reloaded, map);
    assert_eq!(reloaded.resolve(female), reloaded.resolve(male));
    assert_eq!(reloaded.linked_assets(male), vec![female]);
}

#[test]
fn test_lookup_is_case_sensitive() {
    let mut map = CustomizationMap::new();
    map.add_asset("object/Tangible/shirt.iff").unwrap();
    assert!(map.find_asset("object/Tangible/shirt.iff").is_some());
    assert!(map.find_asset("object/tangible/shirt.iff").is_none());
}

proptest! {
    #[test]
    fn prop_checksum_index_stays_sorted(paths in proptest::collection::hash_set("object/[a-z_/]{1,30}\\.iff", 1..40)) {
        let mut map = CustomizationMap::new();
        let mut ids = Vec::new();
        for path in &paths {
            ids.push((path.clone(), map.add_asset(path).unwrap()));
            prop_assert!(map.is_sorted());
        }
        prop_assert_eq!(map.asset_count(), paths.len());
        for (path, id) in &ids {
            prop_assert_eq!(map.find_asset(path), Some(*id));
        }

        let reloaded = customization::decode(&customization::encode(&map)).unwrap();
        for (path, id) in &ids {
            prop_assert_eq!(reloaded.find_asset(path), Some(*id));
        }
    }
}
